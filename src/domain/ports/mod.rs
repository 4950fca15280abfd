//! Port traits for infrastructure implementations.
//!
//! These traits define the boundary between the domain/service layers
//! and concrete adapters (SQLite, HTTP agents, the filesystem store).

pub mod audit_log;
pub mod errors;
pub mod knowledge_reader;
pub mod queue_repository;
pub mod reasoning_agent;
pub mod status_reporter;
pub mod vision_agent;

pub use audit_log::{AuditEvent, AuditLogRepository, AuditRecord};
pub use errors::StoreError;
pub use knowledge_reader::{KnowledgeReader, PageInfo, SearchHit};
pub use queue_repository::{EntryFilters, QueueRepository};
pub use reasoning_agent::{
    AgentError, RawClaim, RawConflictCandidate, RawMission, RawPatch, RawScore, ReasoningAgent,
};
pub use status_reporter::{StatusRecord, StatusReporter};
pub use vision_agent::{PageImage, VisionAgent, VisionFindings};
