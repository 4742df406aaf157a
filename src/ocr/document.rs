//! Whole-document OCR: dispatch by file type and stitch pages together.

use std::path::Path;

use tracing::debug;

use super::backend::{OcrBackend, OcrError};
use super::layout::{average_confidence, OcrOutput};
use super::pdf_utils;

/// Image extensions the OCR stage accepts.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Kind of input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify a path by extension.
    pub fn from_path(path: &Path) -> Result<Self, OcrError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if ext == "pdf" {
            Ok(DocumentKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(DocumentKind::Image)
        } else {
            Err(OcrError::UnsupportedFormat(path.display().to_string()))
        }
    }
}

/// Check whether a path looks like something the pipeline can ingest.
pub fn is_supported(path: &Path) -> bool {
    DocumentKind::from_path(path).is_ok()
}

/// Marker placed between pages in the Markdown export.
fn page_marker(page: u32) -> String {
    format!("<!-- page {} -->", page)
}

/// Run OCR over every page of a document.
pub fn ocr_document(backend: &dyn OcrBackend, path: &Path) -> Result<OcrOutput, OcrError> {
    if !path.exists() {
        return Err(OcrError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("document not found: {}", path.display()),
        )));
    }

    match DocumentKind::from_path(path)? {
        DocumentKind::Image => {
            let result = backend.ocr_image(path, 1)?;
            Ok(OcrOutput {
                text: result.text,
                layout: result.blocks,
                confidence: result.confidence,
                page_count: 1,
            })
        }
        DocumentKind::Pdf => {
            let page_count = pdf_utils::pdf_page_count(path)?;
            let mut sections = Vec::with_capacity(page_count as usize);
            let mut layout = Vec::new();
            let mut confidences = Vec::with_capacity(page_count as usize);

            for page in 1..=page_count {
                debug!("OCR page {}/{} of {}", page, page_count, path.display());
                let result = backend.ocr_pdf_page(path, page)?;
                if page_count > 1 {
                    sections.push(format!("{}\n\n{}", page_marker(page), result.text.trim()));
                } else {
                    sections.push(result.text.trim().to_string());
                }
                layout.extend(result.blocks);
                confidences.push(result.confidence);
            }

            Ok(OcrOutput {
                text: sections.join("\n\n"),
                layout,
                confidence: average_confidence(confidences),
                page_count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{LayoutBlock, OcrBackendType, OcrResult};

    struct EchoBackend;

    impl OcrBackend for EchoBackend {
        fn backend_type(&self) -> OcrBackendType {
            OcrBackendType::Tesseract
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            String::new()
        }
        fn ocr_image(&self, image_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
            let text = format!("text of {}", image_path.display());
            Ok(OcrResult {
                blocks: vec![LayoutBlock {
                    page,
                    block: 1,
                    bbox: None,
                    lines: 1,
                    text: text.clone(),
                    confidence: Some(0.8),
                }],
                text,
                confidence: Some(0.8),
                backend: OcrBackendType::Tesseract,
                processing_time_ms: 0,
            })
        }
    }

    #[test]
    fn test_document_kind() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a/Tender.PDF")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("scan.jpeg")).unwrap(),
            DocumentKind::Image
        );
        assert!(matches!(
            DocumentKind::from_path(Path::new("notes.docx")),
            Err(OcrError::UnsupportedFormat(_))
        ));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_ocr_image_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"").unwrap();

        let output = ocr_document(&EchoBackend, &path).unwrap();
        assert_eq!(output.page_count, 1);
        assert_eq!(output.layout.len(), 1);
        assert_eq!(output.confidence, Some(0.8));
        assert!(output.text.starts_with("text of"));
    }

    #[test]
    fn test_missing_document() {
        let err = ocr_document(&EchoBackend, Path::new("/nonexistent/scan.png")).unwrap_err();
        assert!(matches!(err, OcrError::Io(_)));
    }
}
