use crate::domain::models::{EntryState, QueueEntry, RunOutcome};
use crate::domain::ports::errors::StoreError;
use async_trait::async_trait;

/// Filters for querying queue entries.
#[derive(Default, Debug, Clone)]
pub struct EntryFilters {
    pub state: Option<EntryState>,
    pub limit: Option<i64>,
}

/// Repository port for the durable work queue.
///
/// The queue guarantees at most one entry in `Processing` at any time:
/// `claim_next` performs the pending-to-processing transition atomically
/// and refuses to claim while another entry is in flight. Entries are
/// never deleted; terminal entries keep their outcome for audit.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Persist a new entry in `Pending`.
    async fn enqueue(&self, entry: &QueueEntry) -> Result<(), StoreError>;

    /// Atomically claim the oldest pending entry, transitioning it to
    /// `Processing`. Returns `None` when the queue is empty or another
    /// entry is already processing.
    async fn claim_next(&self) -> Result<Option<QueueEntry>, StoreError>;

    /// Transition an entry to `Done`, attaching its terminal outcome.
    async fn complete(&self, id: &str, outcome: &RunOutcome) -> Result<(), StoreError>;

    /// Re-queue processing entries that have been stalled longer than
    /// `stall_minutes` (crash recovery). Returns the number recovered.
    async fn recover(&self, stall_minutes: i64) -> Result<u64, StoreError>;

    /// Get an entry by id.
    async fn get(&self, id: &str) -> Result<Option<QueueEntry>, StoreError>;

    /// List entries, oldest first.
    async fn list(&self, filters: EntryFilters) -> Result<Vec<QueueEntry>, StoreError>;

    /// Count entries matching the filters.
    async fn count(&self, filters: EntryFilters) -> Result<i64, StoreError>;
}
