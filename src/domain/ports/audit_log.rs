use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{Patch, PatchLayer};
use crate::domain::ports::errors::StoreError;

/// What an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// A patch was applied to a state layer.
    PatchApplied,
    /// A patch was proposed but not applied (shadow mode).
    PatchProposed,
    /// A patch was rejected because it targeted a protected record.
    PatchRejected,
    /// A same-rank conflict was surfaced without auto-resolution.
    ConflictUnresolved,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatchApplied => "patch_applied",
            Self::PatchProposed => "patch_proposed",
            Self::PatchRejected => "patch_rejected",
            Self::ConflictUnresolved => "conflict_unresolved",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "patch_applied" => Some(Self::PatchApplied),
            "patch_proposed" => Some(Self::PatchProposed),
            "patch_rejected" => Some(Self::PatchRejected),
            "conflict_unresolved" => Some(Self::ConflictUnresolved),
            _ => None,
        }
    }
}

/// One immutable audit record. Keyed by `patch_id`, which doubles as
/// the idempotency key for patch application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonically increasing sequence assigned by storage.
    pub seq: i64,
    pub patch_id: String,
    pub entry_id: String,
    pub event: AuditEvent,
    pub layer: Option<PatchLayer>,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build an unsequenced record from a patch; storage assigns `seq`.
    pub fn for_patch(entry_id: &str, event: AuditEvent, patch: &Patch) -> Self {
        Self {
            seq: 0,
            patch_id: patch.id.clone(),
            entry_id: entry_id.to_string(),
            event,
            layer: Some(patch.layer),
            detail: serde_json::to_value(patch).unwrap_or_default(),
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only audit log port. Records are never rewritten or deleted.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Append a record. Returns `false` when a record with the same
    /// patch id already exists (idempotent no-op).
    async fn append(&self, record: &AuditRecord) -> Result<bool, StoreError>;

    /// Whether a patch id has already been recorded.
    async fn contains(&self, patch_id: &str) -> Result<bool, StoreError>;

    /// List records in sequence order, optionally scoped to one entry.
    async fn list(&self, entry_id: Option<&str>, limit: i64) -> Result<Vec<AuditRecord>, StoreError>;
}
