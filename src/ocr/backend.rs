//! OCR backend abstraction.
//!
//! Supports two backends:
//! - Tesseract: traditional OCR via command-line (CPU), with word-level layout
//! - Vision: a vision-language OCR model (e.g. Chandra) served over HTTP

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;

use super::layout::LayoutBlock;
use super::pdf_utils;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Model server error: {0}")]
    ModelServer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of OCR on a single image or page.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text as Markdown.
    pub text: String,
    /// Layout blocks found on the page.
    pub blocks: Vec<LayoutBlock>,
    /// Confidence score (0.0 - 1.0), if available.
    pub confidence: Option<f32>,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Vision-language OCR model behind the model server.
    Vision,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::Vision => "vision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendType::Tesseract),
            "vision" | "vlm" | "chandra" => Some(OcrBackendType::Vision),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for OCR backends.
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend is available (dependencies installed).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Run OCR on an image file. `page` is recorded on the layout blocks.
    fn ocr_image(&self, image_path: &Path, page: u32) -> Result<OcrResult, OcrError>;

    /// Run OCR on a specific page of a PDF file.
    /// Default implementation renders the page to PNG first.
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let temp_dir = TempDir::new()?;
        let image_path = pdf_utils::pdf_page_to_image(pdf_path, page, temp_dir.path())?;
        let mut result = self.ocr_image(&image_path, page)?;
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

/// Configuration for OCR backends.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Language for OCR (e.g., "eng", "deu+eng").
    pub language: String,
    /// Whether to use GPU acceleration if available.
    pub use_gpu: bool,
    /// GPU device string (e.g. "cuda:0").
    pub gpu_device: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            use_gpu: false,
            gpu_device: "cuda:0".to_string(),
        }
    }
}
