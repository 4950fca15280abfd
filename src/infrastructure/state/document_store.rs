use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::errors::StoreError;

/// Filesystem store for patchable JSON documents.
///
/// Targets are relative paths under a fixed root; absolute paths and
/// parent traversal are rejected before any IO happens. Writes go to a
/// sibling temp file and rename into place, so readers never observe a
/// half-written document.
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative target, refusing paths that escape the root.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, StoreError> {
        let path = Path::new(target);
        if path.is_absolute() {
            return Err(StoreError::InvalidState(format!(
                "target must be relative: {target}"
            )));
        }
        for component in path.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StoreError::InvalidState(format!(
                    "target escapes the store root: {target}"
                )));
            }
        }
        Ok(self.root.join(path))
    }

    /// Read a JSON document, or `None` if the target does not exist.
    pub async fn read(&self, target: &str) -> Result<Option<Value>, StoreError> {
        let path = self.resolve(target)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::DocumentIo {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Atomically replace a JSON document: temp file, then rename.
    pub async fn write_atomic(&self, target: &str, doc: &Value) -> Result<(), StoreError> {
        let path = self.resolve(target)?;
        let io_err = |p: &Path, e: std::io::Error| StoreError::DocumentIo {
            path: p.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        let text = serde_json::to_string_pretty(doc)?;
        let tmp = path.with_extension(format!("tmp.{}", Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, text.as_bytes())
            .await
            .map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_err(&path, e))?;

        debug!(target, "document written");
        Ok(())
    }
}
