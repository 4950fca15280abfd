use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ports::errors::StoreError;

/// The single current-progress record shown ambiently while a run is
/// active. Overwritten in place; not part of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub active: bool,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Port for ambient status publication.
///
/// Absence of a record, or `active = false`, means no status is shown.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Overwrite the current status record.
    async fn publish(&self, message: &str, details: Option<Value>) -> Result<(), StoreError>;

    /// Remove the status record entirely.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Read the current record, if any.
    async fn read(&self) -> Result<Option<StatusRecord>, StoreError>;
}
