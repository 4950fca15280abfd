//! Domain-level error taxonomy for the verification pipeline.
//!
//! Failures local to one claim or mission never abort a run; they are
//! accumulated into the entry's outcome. Only audit-log write failures
//! are fatal, because a terminal state without its audit trail cannot be
//! trusted.

use thiserror::Error;

use super::models::entry::EntryState;

/// Pipeline-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No verifiable claims in the trigger payload. A benign terminal
    /// state: the run completes with zero missions.
    #[error("no verifiable claims extracted")]
    ExtractionEmpty,

    /// A vision dispatch exhausted its retry budget. The mission's
    /// claims are scored ungrounded; the run continues.
    #[error("vision dispatch exhausted retries for mission {mission_id}: {reason}")]
    DispatchExhausted { mission_id: String, reason: String },

    /// A patch targeted the protected identity record or a binary
    /// artifact. Rejected and audited, never silently dropped.
    #[error("patch {patch_id} rejected: protected target {target}")]
    ProtectedTarget { patch_id: String, target: String },

    /// A patch targeted a document outside the writable allowlist.
    #[error("patch {patch_id} rejected: target {target} not writable")]
    DisallowedTarget { patch_id: String, target: String },

    /// A field path could not be parsed or applied.
    #[error("invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// A mission's target page does not exist in the knowledge base.
    #[error("target page not found: {page}")]
    PageNotFound { page: String },

    /// Illegal queue-entry lifecycle transition.
    #[error("cannot transition entry {id} from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: EntryState,
        to: EntryState,
    },

    /// Storage failure. Fatal for the run only when the audit log
    /// itself cannot be written.
    #[error("store error: {0}")]
    Store(#[from] crate::domain::ports::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether this failure may abort the run. Everything except audit
    /// trail loss is reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(crate::domain::ports::StoreError::AuditAppendFailed(_)))
    }
}
