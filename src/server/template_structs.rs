//! Askama template structs for the dashboard.
//!
//! Each struct corresponds to an HTML template in the templates/ directory.

use askama::Template;

use crate::agents::Flag;
use crate::repository::{Document, DocumentStatus};
use crate::utils::preview;

/// Characters of OCR text shown on a card.
const OCR_PREVIEW_CHARS: usize = 500;

/// One processed document on the dashboard.
pub struct DocumentCard {
    pub id: i32,
    pub file_name: String,
    /// Badge text, e.g. "🟢 Green".
    pub badge: String,
    /// CSS modifier for the badge.
    pub badge_class: &'static str,
    pub confidence: String,
    pub reasoning: String,
    pub ocr_preview: String,
    /// Empty unless the run failed.
    pub error: String,
    pub date_str: String,
}

impl DocumentCard {
    pub fn from_document(doc: &Document, threshold: f32) -> Self {
        let (badge, badge_class) = match doc.status {
            DocumentStatus::Complete => {
                let flag = Flag::from_score(doc.confidence_score.unwrap_or(0.0), threshold);
                let class = match flag {
                    Flag::Green => "green",
                    _ => "red",
                };
                (format!("{} {}", flag.emoji(), flag), class)
            }
            DocumentStatus::OcrComplete => ("⏳ Reasoning".to_string(), "pending"),
            DocumentStatus::Failed => ("⚠️ Failed".to_string(), "failed"),
        };

        Self {
            id: doc.id,
            file_name: doc.file_name(),
            badge,
            badge_class,
            confidence: doc
                .confidence_score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string()),
            reasoning: doc.agent_reasoning.clone().unwrap_or_default(),
            ocr_preview: preview(&doc.ocr_text, OCR_PREVIEW_CHARS),
            error: doc.error.clone().unwrap_or_default(),
            date_str: doc.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Main dashboard page.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate<'a> {
    pub title: &'a str,
    pub vram_limit: String,
    pub ocr_model: &'a str,
    pub reasoning_model: &'a str,
    pub pipeline_active: bool,
    pub has_documents: bool,
    pub documents: Vec<DocumentCard>,
}
