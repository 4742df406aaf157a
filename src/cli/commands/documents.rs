//! Document listing and inspection commands.

use console::style;

use crate::agents::Flag;
use crate::cli::helpers::{open_database, styled_flag, truncate};
use crate::config::Settings;
use crate::repository::{Document, DocumentStatus};
use crate::utils::preview;

/// Flag to display for a row: the stored one, else derived from the score.
fn display_flag(doc: &Document, threshold: f32) -> Option<Flag> {
    if doc.status != DocumentStatus::Complete {
        return None;
    }
    doc.flag
        .or_else(|| doc.confidence_score.map(|s| Flag::from_score(s, threshold)))
}

/// List processed documents, newest first.
pub async fn cmd_list(settings: &Settings, limit: Option<u32>, json: bool) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let docs = ctx.documents().list(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("{} No documents processed yet", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:>5}  {:<12}  {:>6}  {:<36}  {}",
        style("ID").bold(),
        style("FLAG").bold(),
        style("SCORE").bold(),
        style("FILE").bold(),
        style("PROCESSED").bold()
    );
    for doc in &docs {
        let flag = match display_flag(doc, settings.confidence_threshold) {
            Some(flag) => styled_flag(flag).to_string(),
            None => style(doc.status.to_string()).dim().to_string(),
        };
        let score = doc
            .confidence_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:<12}  {:>6}  {:<36}  {}",
            doc.id,
            flag,
            score,
            truncate(&doc.file_name(), 36),
            doc.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} document(s)", docs.len());

    Ok(())
}

/// Show one document's verdict, reasoning and OCR preview.
pub async fn cmd_show(settings: &Settings, id: i32, json: bool) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let doc = ctx
        .documents()
        .get(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document #{} not found", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} {}", style(format!("#{}", doc.id)).bold(), doc.file_name());
    println!("  {:<12} {}", style("Path").dim(), doc.document);
    println!("  {:<12} {}", style("Status").dim(), doc.status);
    if let Some(flag) = display_flag(&doc, settings.confidence_threshold) {
        println!("  {:<12} {}", style("Flag").dim(), styled_flag(flag));
    }
    if let Some(score) = doc.confidence_score {
        println!("  {:<12} {:.2}", style("Confidence").dim(), score);
    }
    if let Some(score) = doc.ocr_confidence {
        println!("  {:<12} {:.2}", style("OCR conf.").dim(), score);
    }
    if let Some(dims) = doc.embedding_dims() {
        println!("  {:<12} {} dims", style("Embedding").dim(), dims);
    }
    println!(
        "  {:<12} {}",
        style("Processed").dim(),
        doc.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(ref error) = doc.error {
        println!("  {:<12} {}", style("Error").dim(), style(error).red());
    }

    if let Some(ref reasoning) = doc.agent_reasoning {
        println!("\n{}", style("Agent reasoning").cyan());
        println!("{}", reasoning);
    }

    println!("\n{}", style("OCR text").cyan());
    println!("{}", preview(&doc.ocr_text, 500));

    Ok(())
}
