//! OCR module (Stage 1 of the pipeline).
//!
//! Extracts Markdown text and layout blocks from PDFs and images using:
//! - Tesseract OCR (default), which also yields word geometry and confidence
//! - A vision-language OCR model served by the model server
//!
//! PDFs are rendered page by page with poppler-utils before OCR.

mod backend;
mod document;
mod layout;
mod model_utils;
mod pdf_utils;
mod tesseract;
mod vision;

pub use backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
pub use document::{is_supported, ocr_document, DocumentKind, IMAGE_EXTENSIONS};
pub use layout::{average_confidence, BoundingBox, LayoutBlock, OcrOutput};
pub use model_utils::{check_binary, check_tools};
pub use pdf_utils::{pdf_page_count, pdf_page_to_image};
pub use tesseract::TesseractBackend;
pub use vision::VisionBackend;
