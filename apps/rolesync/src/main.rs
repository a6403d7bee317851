//! # rolesync - Role Directory Synchronizer
//!
//! The operator binary for the rolesync reconciliation engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           apps/rolesync (THE BINARY)          │
//! │                                               │
//! │   ┌─────────────┐        ┌───────────────┐    │
//! │   │    CLI      │        │    Config     │    │
//! │   │   (clap)    │        │ (toml + env)  │    │
//! │   └──────┬──────┘        └───────┬───────┘    │
//! │          └───────────┬───────────┘            │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │ rolesync-core │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! rolesync init
//! rolesync validate users.xml
//! rolesync install users.xml
//! rolesync set-users users.xml --json
//! rolesync show alice
//! ```

use clap::Parser;
use rolesync::cli;
use rolesync::config::{LogFormat, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    let settings = match Settings::load(&cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(settings.log_format);

    if !cli.quiet && !cli.json {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli, &settings) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. `log_format = "json"` enables machine-parseable output.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rolesync=info,rolesync_core=info".into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Print the startup banner.
fn print_banner() {
    println!("rolesync v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
