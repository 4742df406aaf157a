//! Tesseract OCR backend implementation.
//!
//! Runs Tesseract with TSV output so each word comes back with its
//! geometry and confidence. Words are regrouped into lines, paragraphs and
//! blocks to build both the Markdown text and the layout.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
use super::layout::{average_confidence, BoundingBox, LayoutBlock};
use super::model_utils::check_binary;

/// TSV level for individual words.
const WORD_LEVEL: u32 = 5;

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    /// Create a new Tesseract backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: OcrConfig::default(),
        }
    }

    /// Create a new Tesseract backend with custom configuration.
    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Run Tesseract on an image file and return its TSV output.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .arg("tsv")
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if !check_binary("pdftoppm") {
            "pdftoppm not installed. Install with: apt install poppler-utils".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    fn ocr_image(&self, image_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let tsv = self.run_tesseract(image_path)?;
        let words = parse_tsv(&tsv);
        let blocks = group_blocks(&words, page);

        Ok(OcrResult {
            text: blocks_to_markdown(&blocks),
            confidence: average_confidence(words.iter().map(|w| Some(w.conf / 100.0))),
            blocks,
            backend: OcrBackendType::Tesseract,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// A recognised word from Tesseract's TSV output.
#[derive(Debug, Clone, PartialEq)]
struct TsvWord {
    block: u32,
    par: u32,
    line: u32,
    bbox: BoundingBox,
    conf: f32,
    text: String,
}

/// Parse word rows from Tesseract TSV, dropping empty and unscored rows.
fn parse_tsv(tsv: &str) -> Vec<TsvWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<u32>().ok();
            if num(0)? != WORD_LEVEL {
                return None;
            }
            let conf: f32 = cols[10].trim().parse().ok()?;
            let text = cols[11..].join("\t").trim().to_string();
            if conf < 0.0 || text.is_empty() {
                return None;
            }
            Some(TsvWord {
                block: num(2)?,
                par: num(3)?,
                line: num(4)?,
                bbox: BoundingBox {
                    left: num(6)?,
                    top: num(7)?,
                    width: num(8)?,
                    height: num(9)?,
                },
                conf,
                text,
            })
        })
        .collect()
}

/// Group words into layout blocks, keeping Tesseract's reading order.
fn group_blocks(words: &[TsvWord], page: u32) -> Vec<LayoutBlock> {
    // block -> (par, line) -> words
    let mut grouped: BTreeMap<u32, BTreeMap<(u32, u32), Vec<&TsvWord>>> = BTreeMap::new();
    for word in words {
        grouped
            .entry(word.block)
            .or_default()
            .entry((word.par, word.line))
            .or_default()
            .push(word);
    }

    grouped
        .into_iter()
        .map(|(block_num, lines)| {
            let mut paragraphs: Vec<Vec<String>> = Vec::new();
            let mut current_par = None;
            let mut bbox: Option<BoundingBox> = None;
            let mut confs = Vec::new();

            for ((par, _), line_words) in &lines {
                let text = line_words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if current_par != Some(*par) {
                    paragraphs.push(Vec::new());
                    current_par = Some(*par);
                }
                if let Some(p) = paragraphs.last_mut() {
                    p.push(text);
                }
                for w in line_words {
                    bbox = Some(match bbox {
                        Some(b) => b.union(&w.bbox),
                        None => w.bbox,
                    });
                    confs.push(Some(w.conf / 100.0));
                }
            }

            LayoutBlock {
                page,
                block: block_num,
                bbox,
                lines: lines.len() as u32,
                text: paragraphs
                    .iter()
                    .map(|p| p.join("\n"))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                confidence: average_confidence(confs),
            }
        })
        .collect()
}

/// Render blocks as Markdown paragraphs.
fn blocks_to_markdown(blocks: &[LayoutBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
