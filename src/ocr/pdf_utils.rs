//! PDF helpers built on poppler-utils (`pdfinfo`, `pdftoppm`).

use std::path::{Path, PathBuf};
use std::process::Command;

use super::backend::OcrError;

/// Rendering resolution for OCR.
const RENDER_DPI: &str = "300";

/// Get PDF page count using pdfinfo.
pub fn pdf_page_count(pdf_path: &Path) -> Result<u32, OcrError> {
    let output = match Command::new("pdfinfo").arg(pdf_path).output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OcrError::BackendNotAvailable(
                "pdfinfo not found (install poppler-utils)".to_string(),
            ));
        }
        Err(e) => return Err(OcrError::Io(e)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OcrError::OcrFailed(format!("pdfinfo failed: {}", stderr)));
    }

    Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)).unwrap_or(1))
}

/// Extract the `Pages:` value from pdfinfo output.
pub fn parse_page_count(pdfinfo_stdout: &str) -> Option<u32> {
    pdfinfo_stdout
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split(':').nth(1))
        .and_then(|s| s.trim().parse::<u32>().ok())
}

/// Convert a PDF page to a PNG image inside `output_dir`.
pub fn pdf_page_to_image(pdf_path: &Path, page: u32, output_dir: &Path) -> Result<PathBuf, OcrError> {
    let page_str = page.to_string();
    let output_prefix = output_dir.join("page");

    let status = Command::new("pdftoppm")
        .args(["-png", "-r", RENDER_DPI, "-f", &page_str, "-l", &page_str])
        .arg(pdf_path)
        .arg(&output_prefix)
        .status();

    match status {
        Ok(s) if s.success() => find_page_image(output_dir, page)
            .ok_or_else(|| OcrError::OcrFailed(format!("No image generated for page {}", page))),
        Ok(_) => Err(OcrError::OcrFailed(
            "pdftoppm failed to convert PDF page".to_string(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::BackendNotAvailable(
            "pdftoppm not found (install poppler-utils)".to_string(),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Find the image file pdftoppm wrote for a page.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    // pdftoppm zero-pads to the width of the last page number
    for digits in 1..=4 {
        let path = dir.join(format!("page-{:0width$}.png", page, width = digits));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let stdout = "Title:          Tender\nProducer:       pdfTeX\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(stdout), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn test_find_page_image_padding() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-03.png"), b"").unwrap();
        assert_eq!(
            find_page_image(dir.path(), 3),
            Some(dir.path().join("page-03.png"))
        );
        assert_eq!(find_page_image(dir.path(), 4), None);
    }
}
