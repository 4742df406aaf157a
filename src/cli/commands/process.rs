//! Single-document processing command.

use std::path::Path;

use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{open_database, spinner, styled_flag};
use crate::config::Settings;
use crate::workflow::{DocumentWorkflow, PipelineEvent};

/// Run OCR and the agents on one file and print the verdict.
pub async fn cmd_process(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let ctx = open_database(settings).await?;
    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(32);
    let workflow = DocumentWorkflow::from_settings(settings, &ctx)?.with_events(event_tx);

    let pb = spinner(format!("Processing {}", file.display()));
    let pb_events = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PipelineEvent::Started { .. } => {
                    pb_events.set_message("Stage 1: OCR");
                }
                PipelineEvent::OcrComplete { id, chars, pages } => {
                    pb_events.println(format!(
                        "  {} OCR done: {} characters from {} page(s) (document #{})",
                        style("✓").green(),
                        chars,
                        pages,
                        id
                    ));
                    pb_events.set_message("Stage 2: agents");
                }
                PipelineEvent::AgentComplete { agent } => {
                    pb_events.println(format!("  {} {} agent", style("✓").green(), agent));
                }
                PipelineEvent::ThinkingMode { confidence } => {
                    pb_events.println(format!(
                        "  {} Low confidence ({:.2}), re-analyzing in thinking mode",
                        style("!").yellow(),
                        confidence
                    ));
                    pb_events.set_message("Thinking mode");
                }
                PipelineEvent::Complete { .. } | PipelineEvent::Failed { .. } => {
                    pb_events.finish_and_clear();
                }
            }
        }
    });

    let result = workflow.process(file).await;
    drop(workflow);
    let _ = event_handler.await;
    pb.finish_and_clear();

    let outcome = result?;
    println!(
        "{} {} {}",
        styled_flag(outcome.flag),
        style(format!("{:.2}", outcome.confidence)).bold(),
        file.display()
    );
    if outcome.thinking_used {
        println!("  {} Thinking mode was used", style("→").dim());
    }
    if !outcome.summary.is_empty() {
        println!("  {}", outcome.summary);
    }
    println!(
        "  {} Stored as document #{}",
        style("→").dim(),
        outcome.id
    );

    Ok(())
}
