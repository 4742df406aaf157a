//! Layout blocks and document-level OCR output.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.height).max(other.top + other.height);
        BoundingBox {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// A block of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    /// 1-based page number.
    pub page: u32,
    /// Block index within the page, in reading order.
    pub block: u32,
    /// Bounding box, when the backend reports geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// Number of text lines in the block.
    pub lines: u32,
    pub text: String,
    /// Mean word confidence (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// OCR output for a whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    /// Markdown export of every page.
    pub text: String,
    /// Layout blocks across all pages.
    pub layout: Vec<LayoutBlock>,
    /// Average confidence across pages that reported one.
    pub confidence: Option<f32>,
    pub page_count: u32,
}

impl OcrOutput {
    /// Serialize the layout to the JSON stored alongside the text.
    pub fn layout_json(&self) -> String {
        serde_json::to_string(&self.layout).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Mean of the confidences that are present.
pub fn average_confidence<I>(values: I) -> Option<f32>
where
    I: IntoIterator<Item = Option<f32>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0f32, 0u32), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}
