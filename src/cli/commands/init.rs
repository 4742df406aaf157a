//! Initialize command.

use console::style;

use crate::cli::helpers::open_database;
use crate::config::Settings;

/// Create the directories and the documents table.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let existed = settings.database_exists();
    let ctx = open_database(settings).await?;

    if existed {
        println!(
            "{} Connected to existing database {}",
            style("✓").green(),
            ctx.db_path().display()
        );
    } else {
        println!(
            "{} Created database {}",
            style("✓").green(),
            ctx.db_path().display()
        );
    }
    println!(
        "  {} Drop documents into {}",
        style("→").dim(),
        settings.data_dir.display()
    );
    println!(
        "{} Initialized {}",
        style("✓").green(),
        settings.project_name
    );

    Ok(())
}
