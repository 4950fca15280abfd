//! Command line interface.
//!
//! Clap command definitions, per-command handlers, and output formatting.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "redline")]
#[command(about = "Redline - construction drawing knowledge auditor", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project configuration and database
    Init(commands::init::InitArgs),

    /// Enqueue audit triggers
    Trigger(commands::trigger::TriggerArgs),

    /// Run the audit worker
    Worker(commands::worker::WorkerArgs),

    /// Inspect and manage the work queue
    Queue(commands::queue::QueueArgs),

    /// Inspect the patch audit log
    Audit(commands::audit::AuditArgs),

    /// Show the current worker status record
    Status(commands::status::StatusArgs),
}

/// Print a top-level error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}
