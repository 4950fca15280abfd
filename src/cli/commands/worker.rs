//! Implementation of the `redline worker` command.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::PatchMode;
use crate::domain::ports::{
    AuditLogRepository, KnowledgeReader, QueueRepository, ReasoningAgent, StatusReporter,
    VisionAgent,
};
use crate::infrastructure::agents::{ChatReasoningAgent, GenerateContentVisionAgent};
use crate::infrastructure::database::{AuditLogRepositoryImpl, QueueRepositoryImpl};
use crate::infrastructure::knowledge::FsKnowledgeReader;
use crate::infrastructure::state::DocumentStore;
use crate::infrastructure::status::FileStatusReporter;
use crate::services::{ClaimExtractor, MissionBuilder, Patcher, Scorer, VisionDispatcher, Worker};

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub command: WorkerCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommands {
    /// Run the audit worker loop
    Run {
        /// Apply patches to disk instead of shadow-mode auditing
        #[arg(long)]
        live: bool,

        /// Process at most one entry, then exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct WorkerOutput {
    pub processed: bool,
    pub message: String,
}

impl CommandOutput for WorkerOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: WorkerArgs, json_mode: bool) -> Result<()> {
    let WorkerCommands::Run { live, once } = args.command;

    let mut config = super::load_config()?;
    if live {
        config.patcher.mode = PatchMode::Live;
    }

    let db = super::open_database(&config).await?;
    let queue: Arc<dyn QueueRepository> = Arc::new(QueueRepositoryImpl::new(db.pool().clone()));
    let audit: Arc<dyn AuditLogRepository> =
        Arc::new(AuditLogRepositoryImpl::new(db.pool().clone()));

    let agent: Arc<dyn ReasoningAgent> = Arc::new(ChatReasoningAgent::from_config(
        &config.reasoning,
        &config.retry,
    )?);
    let vision: Arc<dyn VisionAgent> = Arc::new(GenerateContentVisionAgent::from_config(
        &config.vision,
        &config.retry,
    )?);
    let knowledge: Arc<dyn KnowledgeReader> = Arc::new(FsKnowledgeReader::new(&config.knowledge.root));
    let status: Arc<dyn StatusReporter> =
        Arc::new(FileStatusReporter::new(&config.worker.status_path));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let dispatcher = VisionDispatcher::new(
        vision,
        Arc::clone(&knowledge),
        &config.worker,
        Arc::clone(&cancel),
    );
    let patcher = Patcher::new(
        DocumentStore::new("."),
        Arc::clone(&audit),
        &config.patcher,
        &config.knowledge,
    );

    let worker = Worker::new(
        queue,
        Arc::clone(&agent),
        status,
        ClaimExtractor::new(Arc::clone(&agent)),
        MissionBuilder::new(Arc::clone(&agent)),
        dispatcher,
        Scorer::new(Arc::clone(&agent)),
        patcher,
        config.worker.clone(),
        cancel,
    );

    if once {
        let processed = worker.run_once().await?;
        let output_data = WorkerOutput {
            processed,
            message: if processed {
                "Processed one entry".to_string()
            } else {
                "Queue empty or busy; nothing processed".to_string()
            },
        };
        output(&output_data, json_mode);
    } else {
        info!(mode = ?config.patcher.mode, "worker starting");
        worker.run_forever().await?;
    }

    db.close().await;
    Ok(())
}
