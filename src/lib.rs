//! Redline - construction drawing knowledge auditor
//!
//! Redline is a self-correcting audit pipeline for a construction-drawing
//! knowledge store. Assistant activity and user corrections enqueue audit
//! jobs; a background worker extracts factual claims from recent activity,
//! verifies them against the rendered drawing pages with a vision model,
//! scores each claim, and proposes (or applies) patches to the stored
//! knowledge, with every patch recorded in a durable audit log.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Queue entries, claims, missions, scores,
//!   patches, and the ports the pipeline is built against
//! - **Service Layer** (`services`): The pipeline stages and the worker loop
//! - **Infrastructure Layer** (`infrastructure`): `SQLite` persistence, model
//!   API clients, filesystem knowledge store access
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use redline::services::Worker;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Assemble repositories, agents and pipeline stages, then
//!     // worker.run_forever().await
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Claim, Config, DatabaseConfig, EntryKind, EntryPayload, EntryState, LoggingConfig, Mission,
    Patch, PatchLayer, PatchMode, QueueEntry, RetryConfig, RunOutcome, Score, ScoreCategory,
    SourceKind, VerificationResult, WorkerConfig,
};
pub use domain::ports::{
    AuditLogRepository, EntryFilters, KnowledgeReader, QueueRepository, ReasoningAgent,
    StatusReporter, StoreError, VisionAgent,
};
pub use domain::PipelineError;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Patcher, Scorer, Worker};
