//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod config_cmd;
mod documents;
mod ingest;
mod init;
mod process;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "docintel")]
#[command(about = "Multi-stage document intelligence pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data and storage directories and the database
    Init,

    /// Run the full pipeline on one document
    Process {
        /// PDF or image file
        file: PathBuf,
    },

    /// Process every new document in the data directory
    Ingest {
        /// Keep scanning until Ctrl+C
        #[arg(short, long)]
        watch: bool,
        /// Seconds between scans in watch mode
        #[arg(long, default_value = "30")]
        interval: u64,
    },

    /// Start the dashboard
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:8501)
        #[arg(default_value = "127.0.0.1:8501")]
        bind: String,
    },

    /// List processed documents
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Limit number of results
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show one document's results
    Show {
        /// Document ID
        id: i32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check OCR tools, the model server and the database
    Check,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Process { file } => process::cmd_process(&settings, &file).await,
        Commands::Ingest { watch, interval } => {
            ingest::cmd_ingest(&settings, watch, interval).await
        }
        Commands::Serve { bind } => serve::cmd_serve(&settings, &bind).await,
        Commands::List { json, limit } => documents::cmd_list(&settings, limit, json).await,
        Commands::Show { id, json } => documents::cmd_show(&settings, id, json).await,
        Commands::Check => check::cmd_check(&settings).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings, &config),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["docintel", "-v", "serve"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { ref bind } if bind == "127.0.0.1:8501"));

        let cli = Cli::try_parse_from(["docintel", "ingest", "--watch", "--interval", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                watch: true,
                interval: 5
            }
        ));

        let cli = Cli::try_parse_from(["docintel", "show", "3", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Show { id: 3, json: true }));

        assert!(Cli::try_parse_from(["docintel", "process"]).is_err());
    }
}
