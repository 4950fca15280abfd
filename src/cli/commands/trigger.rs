//! Trigger CLI commands. Enqueues workspace and feedback audit entries.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ToolCall;
use crate::infrastructure::database::QueueRepositoryImpl;
use crate::services::Worker;

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub command: TriggerCommands,
}

#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// Enqueue a workspace-activity trigger
    Workspace {
        /// Workspace slug the activity belongs to
        workspace_slug: String,

        /// User message that started the exchange
        #[arg(short, long)]
        user_message: String,

        /// Assistant response text
        #[arg(short, long)]
        assistant_response: String,

        /// Path to a JSON file holding the workspace snapshot
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Path to a JSON file holding the tool call transcript
        #[arg(short, long)]
        tool_calls: Option<PathBuf>,
    },

    /// Enqueue a feedback trigger (only explicit corrections are kept)
    Feedback {
        /// The user's follow-up message
        user_text: String,

        /// Context of the answer being corrected
        #[arg(short, long, default_value = "")]
        prior_context: String,

        /// Path to a JSON file holding the prior tool call transcript
        #[arg(short, long)]
        tool_calls: Option<PathBuf>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TriggerOutput {
    pub enqueued: bool,
    pub entry_id: Option<String>,
    pub message: String,
}

impl CommandOutput for TriggerOutput {
    fn to_human(&self) -> String {
        match &self.entry_id {
            Some(id) => format!("{} ({})", self.message, id),
            None => self.message.clone(),
        }
    }
}

async fn read_json_file(path: &PathBuf) -> Result<serde_json::Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn read_tool_calls(path: Option<&PathBuf>) -> Result<Vec<ToolCall>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let value = read_json_file(path).await?;
    serde_json::from_value(value)
        .with_context(|| format!("Tool call file {} is not a tool call array", path.display()))
}

pub async fn execute(args: TriggerArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let db = super::open_database(&config).await?;
    let queue = QueueRepositoryImpl::new(db.pool().clone());

    let output_data = match args.command {
        TriggerCommands::Workspace {
            workspace_slug,
            user_message,
            assistant_response,
            snapshot,
            tool_calls,
        } => {
            let snapshot = match snapshot {
                Some(path) => read_json_file(&path).await?,
                None => serde_json::Value::Null,
            };
            let tool_calls = read_tool_calls(tool_calls.as_ref()).await?;
            let entry = Worker::submit_workspace_trigger(
                &queue,
                workspace_slug,
                snapshot,
                user_message,
                assistant_response,
                tool_calls,
            )
            .await?;
            TriggerOutput {
                enqueued: true,
                entry_id: Some(entry.id),
                message: "Workspace trigger enqueued".to_string(),
            }
        }
        TriggerCommands::Feedback {
            user_text,
            prior_context,
            tool_calls,
        } => {
            let tool_calls = read_tool_calls(tool_calls.as_ref()).await?;
            let entry =
                Worker::submit_feedback_trigger(&queue, user_text, prior_context, tool_calls)
                    .await?;
            match entry {
                Some(entry) => TriggerOutput {
                    enqueued: true,
                    entry_id: Some(entry.id),
                    message: "Feedback trigger enqueued".to_string(),
                },
                None => TriggerOutput {
                    enqueued: false,
                    entry_id: None,
                    message: "Feedback is not an explicit correction; nothing enqueued".to_string(),
                },
            }
        }
    };

    db.close().await;
    output(&output_data, json_mode);
    Ok(())
}
