//! Vision-language OCR backend.
//!
//! Sends page images to an OCR-tuned vision model (Chandra, DeepSeek-OCR,
//! olmOCR...) on the model server and asks for Markdown back. These models
//! don't report geometry, so each page becomes a single layout block.

use std::future::Future;
use std::path::Path;
use std::time::Instant;

use tokio::runtime::Handle;

use super::backend::{OcrBackend, OcrBackendType, OcrError, OcrResult};
use super::layout::LayoutBlock;
use crate::llm::{encode_image_base64, LlmClient};

/// Prompt for Markdown extraction.
pub const VISION_OCR_PROMPT: &str = "Extract all text from this document page as Markdown. Preserve headings, lists, tables (as Markdown tables) and handwriting. Return only the extracted content, with no explanations or commentary.";

/// OCR backend backed by a vision model on the model server.
pub struct VisionBackend {
    client: LlmClient,
    model: String,
}

impl VisionBackend {
    pub fn new(client: LlmClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn run_vision(&self, image_path: &Path) -> Result<String, OcrError> {
        let image =
            encode_image_base64(image_path).map_err(|e| OcrError::OcrFailed(e.to_string()))?;
        self.client
            .generate(&self.model, VISION_OCR_PROMPT, &[image])
            .await
            .map_err(|e| OcrError::ModelServer(e.to_string()))
    }
}

impl OcrBackend for VisionBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Vision
    }

    fn is_available(&self) -> bool {
        self.client.config().enabled
    }

    fn availability_hint(&self) -> String {
        if self.client.config().enabled {
            format!(
                "Vision OCR uses model '{}' at {} (pull it on the model server first)",
                self.model,
                self.client.config().endpoint
            )
        } else {
            "LLM access is disabled (LLM_ENABLED=false)".to_string()
        }
    }

    fn ocr_image(&self, image_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let markdown = block_on_async("vision", self.run_vision(image_path))?;
        let text = strip_markdown_fence(&markdown).to_string();

        Ok(OcrResult {
            blocks: vec![LayoutBlock {
                page,
                block: 1,
                bbox: None,
                lines: text.lines().count() as u32,
                text: text.clone(),
                confidence: None,
            }],
            text,
            confidence: None,
            backend: OcrBackendType::Vision,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Block on an async future using the current tokio runtime handle.
///
/// Must be called from a blocking context (e.g. `spawn_blocking`).
fn block_on_async<F, T>(backend_name: &str, future: F) -> Result<T, OcrError>
where
    F: Future<Output = Result<T, OcrError>>,
{
    let handle = Handle::try_current().map_err(|_| {
        OcrError::OcrFailed(format!(
            "No tokio runtime available for {} OCR",
            backend_name
        ))
    })?;
    handle.block_on(future)
}

/// Vision models like to wrap their answer in a ```markdown fence.
fn strip_markdown_fence(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
