use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::domain::models::{EntryState, QueueEntry, RunOutcome};
use crate::domain::ports::errors::StoreError;
use crate::domain::ports::queue_repository::{EntryFilters, QueueRepository};
use crate::infrastructure::database::utils::parse_datetime;

/// `SQLite` implementation of `QueueRepository` using sqlx.
///
/// The single-consumer invariant lives here: `claim_next` runs inside an
/// immediate transaction and bails out when any entry is already in
/// `processing`, so two workers on the same database cannot both claim.
pub struct QueueRepositoryImpl {
    pool: SqlitePool,
}

impl QueueRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Helper to convert a database row to a `QueueEntry`
    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<QueueEntry, StoreError> {
        let state_raw: String = row.get("state");
        let state = EntryState::from_str(&state_raw)
            .ok_or_else(|| StoreError::InvalidState(state_raw.clone()))?;

        let kind_raw: String = row.get("kind");
        let kind = crate::domain::models::EntryKind::from_str(&kind_raw)
            .ok_or_else(|| StoreError::InvalidState(format!("unknown entry kind: {kind_raw}")))?;

        Ok(QueueEntry {
            id: row.get("id"),
            kind,
            payload: serde_json::from_str(row.get::<String, _>("payload").as_str())?,
            state,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            processing_started_at: row
                .get::<Option<String>, _>("processing_started_at")
                .as_ref()
                .and_then(|s| parse_datetime(s).ok()),
            processing_finished_at: row
                .get::<Option<String>, _>("processing_finished_at")
                .as_ref()
                .and_then(|s| parse_datetime(s).ok()),
            outcome: row
                .get::<Option<String>, _>("outcome")
                .as_ref()
                .and_then(|s| serde_json::from_str(s).ok()),
        })
    }

    fn filter_clause(filters: &EntryFilters) -> (String, Option<String>) {
        let state = filters.state.map(|s| s.as_str().to_string());
        let clause = if state.is_some() {
            "WHERE state = ?".to_string()
        } else {
            String::new()
        };
        (clause, state)
    }
}

#[async_trait]
impl QueueRepository for QueueRepositoryImpl {
    async fn enqueue(&self, entry: &QueueEntry) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&entry.payload)?;
        let outcome = entry
            .outcome
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let created_at = entry.created_at.to_rfc3339();
        let started_at = entry.processing_started_at.map(|dt| dt.to_rfc3339());
        let finished_at = entry.processing_finished_at.map(|dt| dt.to_rfc3339());

        sqlx::query(
            r"
            INSERT INTO queue_entries (
                id, kind, payload, state, created_at,
                processing_started_at, processing_finished_at, outcome
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&entry.id)
        .bind(entry.kind.as_str())
        .bind(&payload)
        .bind(entry.state.as_str())
        .bind(&created_at)
        .bind(&started_at)
        .bind(&finished_at)
        .bind(&outcome)
        .execute(&self.pool)
        .await?;

        debug!(entry_id = %entry.id, kind = entry.kind.as_str(), "enqueued entry");
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<QueueEntry>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // One entry in flight at a time. A claim while another entry is
        // processing would let two runs patch state concurrently.
        let in_flight: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE state = 'processing'")
                .fetch_one(&mut *tx)
                .await?;

        if in_flight > 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // Entry ids sort chronologically, so MIN(id) is the oldest.
        let candidate = sqlx::query(
            "SELECT * FROM queue_entries WHERE state = 'pending' ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut entry = Self::row_to_entry(&row)?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE queue_entries
             SET state = 'processing', processing_started_at = ?
             WHERE id = ? AND state = 'pending'",
        )
        .bind(now.to_rfc3339())
        .bind(&entry.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;

        entry.state = EntryState::Processing;
        entry.processing_started_at = Some(now);
        info!(entry_id = %entry.id, "claimed entry for processing");
        Ok(Some(entry))
    }

    async fn complete(&self, id: &str, outcome: &RunOutcome) -> Result<(), StoreError> {
        let outcome_json = serde_json::to_string(outcome)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE queue_entries
             SET state = 'done', processing_finished_at = ?, outcome = ?
             WHERE id = ? AND state = 'processing'",
        )
        .bind(&now)
        .bind(&outcome_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id.to_string()));
        }

        info!(entry_id = %id, "entry completed");
        Ok(())
    }

    async fn recover(&self, stall_minutes: i64) -> Result<u64, StoreError> {
        let cutoff = (Utc::now() - Duration::minutes(stall_minutes)).to_rfc3339();

        let result = sqlx::query(
            "UPDATE queue_entries
             SET state = 'pending', processing_started_at = NULL
             WHERE state = 'processing' AND processing_started_at < ?",
        )
        .bind(&cutoff)
        .execute(&self.pool)
        .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            warn!(recovered, stall_minutes, "re-queued stalled entries");
        }
        Ok(recovered)
    }

    async fn get(&self, id: &str) -> Result<Option<QueueEntry>, StoreError> {
        let row = sqlx::query("SELECT * FROM queue_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn list(&self, filters: EntryFilters) -> Result<Vec<QueueEntry>, StoreError> {
        let (clause, state) = Self::filter_clause(&filters);
        let limit = filters.limit.unwrap_or(100);

        let sql = format!("SELECT * FROM queue_entries {clause} ORDER BY id ASC LIMIT ?");
        let mut query = sqlx::query(&sql);
        if let Some(state) = &state {
            query = query.bind(state);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn count(&self, filters: EntryFilters) -> Result<i64, StoreError> {
        let (clause, state) = Self::filter_clause(&filters);

        let sql = format!("SELECT COUNT(*) FROM queue_entries {clause}");
        let mut query = sqlx::query_scalar(&sql);
        if let Some(state) = &state {
            query = query.bind(state);
        }

        Ok(query.fetch_one(&self.pool).await?)
    }
}
