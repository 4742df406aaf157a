//! Shared helper functions for CLI commands.

use std::time::Duration;

use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

use crate::agents::Flag;
use crate::config::Settings;
use crate::repository::DbContext;

/// Open the configured database, creating the schema if needed.
pub async fn open_database(settings: &Settings) -> anyhow::Result<DbContext> {
    settings.ensure_directories()?;
    let ctx = DbContext::new(&settings.database_path());
    ctx.init_schema().await?;
    Ok(ctx)
}

/// Spinner for a single long-running step.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {elapsed:>4} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Flag with its emoji, coloured for the terminal.
pub fn styled_flag(flag: Flag) -> StyledObject<String> {
    let text = format!("{} {}", flag.emoji(), flag);
    match flag {
        Flag::Green => style(text).green(),
        Flag::Red => style(text).red(),
        Flag::Yellow => style(text).yellow(),
    }
}

/// Truncate a string to `max` characters, adding "..." if cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}
