//! Data-directory ingestion.
//!
//! Every supported file dropped into the data directory goes through the
//! workflow once. Files are recognised by content hash, so renaming a file
//! does not re-process it; a file whose earlier run failed is retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::ocr::is_supported;
use crate::repository::DocumentStatus;
use crate::utils::sha256_file;
use crate::workflow::DocumentWorkflow;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestSummary {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

/// Scans a folder and feeds new documents to the shared workflow.
#[derive(Clone)]
pub struct IngestPipeline {
    workflow: Arc<Mutex<DocumentWorkflow>>,
    data_dir: PathBuf,
}

impl IngestPipeline {
    pub fn new(workflow: Arc<Mutex<DocumentWorkflow>>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            workflow,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Supported files directly inside the data directory, sorted by name.
    pub fn candidates(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Process every new document once.
    pub async fn scan(&self) -> anyhow::Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        let files = self.candidates()?;
        debug!(
            "Found {} candidate file(s) in {}",
            files.len(),
            self.data_dir.display()
        );

        for path in files {
            let hash = match sha256_file(&path) {
                Ok(h) => h,
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };
            // Hold the lock across the lookup and the run so overlapping
            // scans can't both treat the same file as new.
            let workflow = self.workflow.lock().await;
            let existing = workflow.documents().find_by_hash(&hash).await?;
            if existing.is_some_and(|doc| doc.status != DocumentStatus::Failed) {
                debug!("Skipping {} (already processed)", path.display());
                summary.skipped += 1;
                continue;
            }

            match workflow.process(&path).await {
                Ok(outcome) => {
                    info!(
                        "Processed {} (confidence {:.2}, {})",
                        path.display(),
                        outcome.confidence,
                        outcome.flag
                    );
                    summary.processed += 1;
                }
                Err(e) => {
                    error!("Failed to process {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Scan repeatedly until Ctrl+C.
    pub async fn watch(&self, interval: Duration) -> anyhow::Result<IngestSummary> {
        let mut totals = IngestSummary::default();
        info!(
            "Watching {} every {}s",
            self.data_dir.display(),
            interval.as_secs()
        );
        loop {
            let summary = self.scan().await?;
            totals.processed += summary.processed;
            totals.skipped = summary.skipped;
            totals.failed += summary.failed;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping watch");
                    break;
                }
            }
        }
        Ok(totals)
    }
}
