//! Web server command.

use console::style;

use crate::cli::helpers::open_database;
use crate::config::Settings;

const DEFAULT_PORT: u16 = 8501;

/// Start the dashboard.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let bind = parse_bind_address(bind);

    println!("{} Preparing database...", style("→").cyan());
    let ctx = match open_database(settings).await {
        Ok(ctx) => {
            println!("  {} Database ready", style("✓").green());
            ctx
        }
        Err(e) => {
            eprintln!("  {} Database setup failed: {}", style("✗").red(), e);
            return Err(e);
        }
    };

    println!(
        "{} Starting {} dashboard at http://{}",
        style("→").cyan(),
        settings.project_name,
        bind
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &ctx, &bind).await
}

/// Parse a bind address that can be:
/// - Just a port: "8080" -> 127.0.0.1:8080
/// - Just a host: "0.0.0.0" -> 0.0.0.0:8501
/// - Host and port: "0.0.0.0:8080"
fn parse_bind_address(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() {
            return format!("{}:{}", host, port_str);
        }
    }

    format!("{}:{}", bind, DEFAULT_PORT)
}
