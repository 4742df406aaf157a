//! Data-directory ingestion command.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::Mutex;

use crate::cli::helpers::open_database;
use crate::config::Settings;
use crate::ingest::IngestPipeline;
use crate::workflow::DocumentWorkflow;

/// Process new documents in the data directory, once or continuously.
pub async fn cmd_ingest(settings: &Settings, watch: bool, interval: u64) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let workflow = DocumentWorkflow::from_settings(settings, &ctx)?;
    let pipeline = IngestPipeline::new(Arc::new(Mutex::new(workflow)), settings.data_dir.clone());

    println!(
        "{} Scanning {}",
        style("→").cyan(),
        pipeline.data_dir().display()
    );

    let summary = if watch {
        println!("  Press Ctrl+C to stop");
        pipeline.watch(Duration::from_secs(interval.max(1))).await?
    } else {
        pipeline.scan().await?
    };

    if summary.total() == 0 {
        println!("{} No documents found", style("!").yellow());
        return Ok(());
    }

    println!(
        "{} Ingest complete: {} processed, {} skipped, {} failed",
        style("✓").green(),
        summary.processed,
        summary.skipped,
        summary.failed
    );
    if summary.failed > 0 {
        println!(
            "  {} Failed documents are retried on the next scan",
            style("→").dim()
        );
    }

    Ok(())
}
