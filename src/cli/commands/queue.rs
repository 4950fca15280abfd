//! Work queue CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::cli::output::{format_entry_table, output, print_entry_detail, CommandOutput};
use crate::domain::models::{EntryState, QueueEntry};
use crate::domain::ports::{EntryFilters, QueueRepository};
use crate::infrastructure::database::QueueRepositoryImpl;

#[derive(Args, Debug)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List queue entries, oldest first
    List {
        /// Filter by state (pending, processing, done)
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum number of entries to display
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Show details for a single entry
    Show {
        /// Entry ID
        entry_id: String,
    },

    /// Re-queue stalled processing entries
    Recover,
}

#[derive(Debug, serde::Serialize)]
struct ListOutput {
    entries: Vec<QueueEntry>,
    total: i64,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "Queue is empty.".to_string();
        }
        format!(
            "{}\n{} of {} entries",
            format_entry_table(&self.entries),
            self.entries.len(),
            self.total
        )
    }
}

#[derive(Debug, serde::Serialize)]
struct RecoverOutput {
    recovered: u64,
}

impl CommandOutput for RecoverOutput {
    fn to_human(&self) -> String {
        match self.recovered {
            0 => "No stalled entries found.".to_string(),
            n => format!("Re-queued {n} stalled entr{}.", if n == 1 { "y" } else { "ies" }),
        }
    }
}

pub async fn execute(args: QueueArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let db = super::open_database(&config).await?;
    let queue = QueueRepositoryImpl::new(db.pool().clone());

    match args.command {
        QueueCommands::List { state, limit } => {
            let state = match state {
                Some(s) => Some(
                    EntryState::from_str(&s)
                        .ok_or_else(|| anyhow!("unknown state: {s} (expected pending, processing or done)"))?,
                ),
                None => None,
            };
            let filters = EntryFilters {
                state,
                limit: Some(limit),
            };
            let entries = queue.list(filters.clone()).await?;
            let total = queue
                .count(EntryFilters {
                    state: filters.state,
                    limit: None,
                })
                .await?;
            output(&ListOutput { entries, total }, json_mode);
        }
        QueueCommands::Show { entry_id } => {
            let entry = queue
                .get(&entry_id)
                .await?
                .ok_or_else(|| anyhow!("entry not found: {entry_id}"))?;
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_entry_detail(&entry);
            }
        }
        QueueCommands::Recover => {
            let recovered = queue.recover(config.worker.stall_minutes).await?;
            output(&RecoverOutput { recovered }, json_mode);
        }
    }

    db.close().await;
    Ok(())
}
