//! Shared utilities for OCR backends.

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// External tools the OCR stage may call, with their install hints.
pub const OCR_TOOLS: &[(&str, &str)] = &[
    ("tesseract", "tesseract-ocr"),
    ("pdftoppm", "poppler-utils"),
    ("pdfinfo", "poppler-utils"),
];

/// Report which OCR tools are installed.
pub fn check_tools() -> Vec<(&'static str, &'static str, bool)> {
    OCR_TOOLS
        .iter()
        .map(|(tool, package)| (*tool, *package, check_binary(tool)))
        .collect()
}
