//! CLI command definitions for the `concierge` binary.
//!
//! Uses clap derive macros for argument parsing. Subcommands follow a
//! noun-verb pattern (e.g., `concierge handlers list`, `concierge providers status`).

pub mod dispatch;
pub mod handlers;
pub mod providers;
pub mod usage;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Route messages to local handlers or the cheapest capable AI provider.
#[derive(Parser)]
#[command(name = "concierge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config.toml (defaults to $CONCIERGE_CONFIG, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch a single message and print the response.
    Dispatch(dispatch::DispatchArgs),

    /// Inspect registered capability handlers.
    Handlers {
        #[command(subcommand)]
        action: handlers::HandlersCommand,
    },

    /// Inspect configured AI providers.
    Providers {
        #[command(subcommand)]
        action: providers::ProvidersCommand,
    },

    /// Show provider usage and spend over a trailing window.
    Usage {
        /// Window length in seconds.
        #[arg(long, default_value = "3600")]
        window_secs: u64,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, short, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
