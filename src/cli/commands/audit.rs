//! Audit log CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::{format_audit_table, output, CommandOutput};
use crate::domain::ports::{AuditLogRepository, AuditRecord};
use crate::infrastructure::database::AuditLogRepositoryImpl;

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// List audit records, oldest first
    List {
        /// Only show records for this queue entry
        #[arg(short, long)]
        entry: Option<String>,

        /// Maximum number of records to display
        #[arg(short, long, default_value = "100")]
        limit: i64,
    },
}

#[derive(Debug, serde::Serialize)]
struct AuditListOutput {
    records: Vec<AuditRecord>,
}

impl CommandOutput for AuditListOutput {
    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return "Audit log is empty.".to_string();
        }
        format_audit_table(&self.records)
    }
}

pub async fn execute(args: AuditArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let db = super::open_database(&config).await?;
    let audit = AuditLogRepositoryImpl::new(db.pool().clone());

    let AuditCommands::List { entry, limit } = args.command;
    let records = audit.list(entry.as_deref(), limit).await?;
    output(&AuditListOutput { records }, json_mode);

    db.close().await;
    Ok(())
}
