//! Configuration management commands.

use console::style;

use crate::config::{Config, Settings};

const REDACTED: &str = "********";

/// Print the effective settings as JSON, with secrets redacted.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => eprintln!("{} Config file: {}", style("→").dim(), path.display()),
        None => eprintln!("{} No config file found, using defaults", style("!").yellow()),
    }

    println!("{}", serde_json::to_string_pretty(&redacted(settings)?)?);
    Ok(())
}

fn redacted(settings: &Settings) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(settings)?;
    if let Some(key) = value.pointer_mut("/llm/api_key") {
        if !key.is_null() {
            *key = serde_json::Value::String(REDACTED.to_string());
        }
    }
    Ok(value)
}
