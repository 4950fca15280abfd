//! Read-only filesystem adapter onto the ingested knowledge store.
//!
//! Layout, one directory per drawing page under the configured root:
//!
//! ```text
//! knowledge_store/
//!   S-201/
//!     pass1.json    summary pass: discipline, page_type, summary text
//!     pass2.json    index pass: regions, schedules, cross references
//!     page.png      rendered page image
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::ports::errors::StoreError;
use crate::domain::ports::knowledge_reader::{KnowledgeReader, PageInfo, SearchHit};
use crate::domain::ports::vision_agent::PageImage;

const SUMMARY_FILE: &str = "pass1.json";
const INDEX_FILE: &str = "pass2.json";
const IMAGE_FILE: &str = "page.png";

/// Filesystem implementation of [`KnowledgeReader`].
pub struct FsKnowledgeReader {
    root: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct SummaryDoc {
    #[serde(default)]
    discipline: String,
    #[serde(default)]
    page_type: String,
    #[serde(default)]
    summary: String,
}

impl FsKnowledgeReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn io_err(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::DocumentIo {
            path: path.display().to_string(),
            source,
        }
    }

    async fn page_dirs(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::io_err(&self.root, e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_err(&self.root, e))?
        {
            let path = entry.path();
            if path.is_dir() && path.join(SUMMARY_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read_summary_doc(&self, page: &str) -> Result<Option<SummaryDoc>, StoreError> {
        let path = self.root.join(page).join(SUMMARY_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }
}

/// Collapse a page reference to comparable form: lowercase alphanumerics
/// only, so "K-601", "k_601", and "K601" all match the same directory.
fn normalize_reference(reference: &str) -> String {
    reference
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

#[async_trait]
impl KnowledgeReader for FsKnowledgeReader {
    async fn list_pages(&self) -> Result<Vec<PageInfo>, StoreError> {
        let mut pages = Vec::new();
        for name in self.page_dirs().await? {
            let doc = self.read_summary_doc(&name).await?.unwrap_or_default();
            pages.push(PageInfo {
                name,
                discipline: doc.discipline,
                page_type: doc.page_type,
            });
        }
        Ok(pages)
    }

    async fn resolve_page(&self, reference: &str) -> Result<Option<String>, StoreError> {
        let wanted = normalize_reference(reference);
        if wanted.is_empty() {
            return Ok(None);
        }

        for name in self.page_dirs().await? {
            if normalize_reference(&name) == wanted {
                return Ok(Some(name));
            }
        }

        debug!(reference, "page reference did not resolve");
        Ok(None)
    }

    async fn get_summary(&self, page: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_summary_doc(page).await?.map(|d| d.summary))
    }

    async fn get_index(&self, page: &str) -> Result<Option<Value>, StoreError> {
        let path = self.root.join(page).join(INDEX_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, StoreError> {
        let needle = query.to_ascii_lowercase();
        let mut hits = Vec::new();

        for name in self.page_dirs().await? {
            let Some(doc) = self.read_summary_doc(&name).await? else {
                continue;
            };
            let haystack = doc.summary.to_ascii_lowercase();
            if let Some(pos) = haystack.find(&needle) {
                // Keep a window around the match so the hit reads in context.
                let mut start = pos.saturating_sub(80);
                while !doc.summary.is_char_boundary(start) {
                    start -= 1;
                }
                let mut end = (pos + needle.len() + 80).min(doc.summary.len());
                while !doc.summary.is_char_boundary(end) {
                    end += 1;
                }
                hits.push(SearchHit {
                    page_name: name,
                    snippet: doc.summary[start..end].to_string(),
                });
            }
        }

        Ok(hits)
    }

    async fn get_region(&self, page: &str, region_id: &str) -> Result<Option<String>, StoreError> {
        let Some(index) = self.get_index(page).await? else {
            return Ok(None);
        };

        let region = index
            .get("regions")
            .and_then(Value::as_array)
            .and_then(|regions| {
                regions
                    .iter()
                    .find(|r| r.get("id").and_then(Value::as_str) == Some(region_id))
            });

        Ok(region.map(std::string::ToString::to_string))
    }

    async fn page_image(&self, page: &str) -> Result<Option<PageImage>, StoreError> {
        let path = self.root.join(page).join(IMAGE_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(PageImage {
                page_name: page.to_string(),
                bytes,
                mime: "image/png".to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }
}
