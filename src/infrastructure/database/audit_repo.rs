use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::models::PatchLayer;
use crate::domain::ports::audit_log::{AuditEvent, AuditLogRepository, AuditRecord};
use crate::domain::ports::errors::StoreError;
use crate::infrastructure::database::utils::parse_datetime;

/// `SQLite` implementation of the append-only audit log.
///
/// `patch_id` carries a UNIQUE constraint; replaying a patch id is an
/// idempotent no-op rather than an error. Any other write failure is
/// surfaced as `AuditAppendFailed`, the one error the pipeline treats
/// as fatal.
pub struct AuditLogRepositoryImpl {
    pool: SqlitePool,
}

impl AuditLogRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord, StoreError> {
        let event_raw: String = row.get("event");
        let event = AuditEvent::from_str(&event_raw)
            .ok_or_else(|| StoreError::InvalidState(format!("unknown audit event: {event_raw}")))?;

        Ok(AuditRecord {
            seq: row.get("seq"),
            patch_id: row.get("patch_id"),
            entry_id: row.get("entry_id"),
            event,
            layer: row
                .get::<Option<String>, _>("layer")
                .as_deref()
                .and_then(PatchLayer::from_str),
            detail: serde_json::from_str(row.get::<String, _>("detail").as_str())?,
            recorded_at: parse_datetime(row.get::<String, _>("recorded_at").as_str())?,
        })
    }
}

#[async_trait]
impl AuditLogRepository for AuditLogRepositoryImpl {
    async fn append(&self, record: &AuditRecord) -> Result<bool, StoreError> {
        let detail = serde_json::to_string(&record.detail)
            .map_err(|e| StoreError::AuditAppendFailed(e.to_string()))?;

        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO audit_log (
                patch_id, entry_id, event, layer, detail, recorded_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.patch_id)
        .bind(&record.entry_id)
        .bind(record.event.as_str())
        .bind(record.layer.map(|l| l.as_str()))
        .bind(&detail)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::AuditAppendFailed(e.to_string()))?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!(patch_id = %record.patch_id, "duplicate patch id, audit append skipped");
        }
        Ok(inserted)
    }

    async fn contains(&self, patch_id: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE patch_id = ?")
            .bind(patch_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn list(
        &self,
        entry_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let rows = if let Some(entry_id) = entry_id {
            sqlx::query("SELECT * FROM audit_log WHERE entry_id = ? ORDER BY seq ASC LIMIT ?")
                .bind(entry_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM audit_log ORDER BY seq ASC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(Self::row_to_record).collect()
    }
}
