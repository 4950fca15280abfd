//! Implementation of the `redline status` command.

use anyhow::Result;
use clap::Args;
use console::style;

use crate::cli::output::{output, CommandOutput};
use crate::domain::ports::{StatusRecord, StatusReporter};
use crate::infrastructure::status::FileStatusReporter;

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, serde::Serialize)]
struct StatusOutput {
    record: Option<StatusRecord>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let Some(record) = &self.record else {
            return "Worker idle (no status record).".to_string();
        };

        let badge = if record.active {
            style("active").green().to_string()
        } else {
            style("idle").dim().to_string()
        };
        let mut lines = vec![
            format!("Worker: {badge}"),
            format!("  {}", record.message),
            format!("  Updated: {}", record.updated_at.to_rfc3339()),
        ];
        if let Some(details) = &record.details {
            lines.push(format!("  Details: {details}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(_args: StatusArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let reporter = FileStatusReporter::new(&config.worker.status_path);
    let record = reporter.read().await?;
    output(&StatusOutput { record }, json_mode);
    Ok(())
}
