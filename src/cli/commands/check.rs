//! Environment check command.

use console::style;

use crate::config::Settings;
use crate::llm::LlmClient;
use crate::ocr::{check_tools, OcrBackend, OcrBackendType, TesseractBackend};
use crate::repository::DbContext;

/// Report which external tools, models and storage are usable.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    let mut all_ok = true;

    println!("{}", style("OCR tools:").cyan());
    for (tool, package, available) in check_tools() {
        let status = if available {
            style("✓ found".to_string()).green()
        } else {
            style(format!("✗ not found (install {})", package)).red()
        };
        println!("  {:<15} {}", tool, status);
    }

    if settings.ocr_backend == OcrBackendType::Tesseract {
        let tesseract = TesseractBackend::new();
        if !tesseract.is_available() {
            all_ok = false;
            println!("  {}", style(tesseract.availability_hint()).dim());
        }
    }

    println!("\n{}", style("Model server:").cyan());
    let client = LlmClient::new(settings.llm.clone())?;
    println!("  {:<15} {}", "endpoint", client.config().endpoint);
    if client.is_available().await {
        println!("  {:<15} {}", "status", style("✓ reachable").green());
        let models = client.list_models().await.unwrap_or_default();
        let mut wanted = vec![settings.reasoning_llm_version.as_str()];
        if settings.ocr_backend == OcrBackendType::Vision {
            wanted.push(settings.ocr_model_version.as_str());
        }
        if let Some(ref embedding) = settings.embedding_model {
            wanted.push(embedding.as_str());
        }
        for model in wanted {
            if models.iter().any(|m| m == model || m.starts_with(&format!("{}:", model))) {
                println!("  {:<15} {}", model, style("✓ available").green());
            } else {
                all_ok = false;
                println!("  {:<15} {}", model, style("✗ not pulled").red());
            }
        }
    } else {
        all_ok = false;
        println!("  {:<15} {}", "status", style("✗ unreachable").red());
    }

    println!("\n{}", style("Memory budget:").cyan());
    let peak = settings.ocr_footprint_gb.max(settings.reasoning_footprint_gb);
    let fits = peak <= settings.vram_limit_gb;
    println!(
        "  {:<15} {:.1} GB / {:.1} GB on {} {}",
        "peak",
        peak,
        settings.vram_limit_gb,
        settings.gpu_device,
        if fits {
            style("✓").green()
        } else {
            style("✗ exceeds limit").red()
        }
    );
    all_ok &= fits;

    println!("\n{}", style("Database:").cyan());
    let db_path = settings.database_path();
    if settings.database_exists() {
        let ctx = DbContext::new(&db_path);
        match ctx.test_connection().await {
            Ok(()) => {
                let count = ctx.documents().count().await.unwrap_or(0);
                println!(
                    "  {} {} ({} documents)",
                    style("✓").green(),
                    db_path.display(),
                    count
                );
            }
            Err(e) => {
                all_ok = false;
                println!("  {} {}: {}", style("✗").red(), db_path.display(), e);
            }
        }
    } else {
        println!(
            "  {} {} does not exist yet (run init)",
            style("!").yellow(),
            db_path.display()
        );
    }

    println!();
    if all_ok {
        println!("{} Ready", style("✓").green());
    } else {
        println!("{} Some checks failed", style("!").yellow());
    }

    Ok(())
}
