use thiserror::Error;

/// Storage operation errors shared by the queue, audit log, and state
/// document adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("invalid state value in storage: {0}")]
    InvalidState(String),

    #[error("document io error at {path}: {source}")]
    DocumentIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The one storage failure that is fatal for a run.
    #[error("audit log append failed: {0}")]
    AuditAppendFailed(String),
}
