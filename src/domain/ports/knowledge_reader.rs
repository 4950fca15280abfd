use async_trait::async_trait;

use crate::domain::ports::errors::StoreError;
use crate::domain::ports::vision_agent::PageImage;

/// Summary listing of one ingested page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub name: String,
    pub discipline: String,
    pub page_type: String,
}

/// One hit from a knowledge-base text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub page_name: String,
    pub snippet: String,
}

/// Read-only port onto the ingested knowledge base.
///
/// Ingestion is owned by an external collaborator; this pipeline only
/// reads page summaries, indexes, and rendered images from it.
#[async_trait]
pub trait KnowledgeReader: Send + Sync {
    async fn list_pages(&self) -> Result<Vec<PageInfo>, StoreError>;

    /// Resolve a possibly-fuzzy page reference ("K-601", "k_601") to a
    /// canonical page name, or `None` if nothing matches.
    async fn resolve_page(&self, reference: &str) -> Result<Option<String>, StoreError>;

    async fn get_summary(&self, page: &str) -> Result<Option<String>, StoreError>;

    async fn get_index(&self, page: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError>;

    async fn get_region(&self, page: &str, region_id: &str) -> Result<Option<String>, StoreError>;

    /// Load the rendered image for a page, for vision dispatch.
    async fn page_image(&self, page: &str) -> Result<Option<PageImage>, StoreError>;
}
