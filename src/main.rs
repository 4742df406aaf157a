//! docintel - multi-stage document intelligence pipeline.
//!
//! Runs an OCR pass over scanned documents, then reasons over the extracted
//! content with vision, text and fusion agents backed by a local LLM.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if docintel::cli::is_verbose() {
        "docintel=info"
    } else {
        "docintel=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    docintel::cli::run().await
}
