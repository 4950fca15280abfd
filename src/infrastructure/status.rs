use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::errors::StoreError;
use crate::domain::ports::status_reporter::{StatusRecord, StatusReporter};

/// File-backed status reporter.
///
/// Keeps exactly one JSON record on disk, overwritten in place with a
/// temp-file-and-rename so observers never read a torn record.
pub struct FileStatusReporter {
    path: PathBuf,
}

impl FileStatusReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, e: std::io::Error) -> StoreError {
        StoreError::DocumentIo {
            path: self.path.display().to_string(),
            source: e,
        }
    }
}

#[async_trait]
impl StatusReporter for FileStatusReporter {
    async fn publish(&self, message: &str, details: Option<Value>) -> Result<(), StoreError> {
        let record = StatusRecord {
            active: true,
            message: message.to_string(),
            updated_at: Utc::now(),
            details,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let text = serde_json::to_string_pretty(&record)?;
        let tmp = self
            .path
            .with_extension(format!("tmp.{}", Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, text.as_bytes())
            .await
            .map_err(|e| self.io_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;

        debug!(message, "status published");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    async fn read(&self) -> Result<Option<StatusRecord>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_overwrites_single_record() {
        let dir = TempDir::new().unwrap();
        let reporter = FileStatusReporter::new(dir.path().join("status.json"));

        reporter.publish("extracting claims", None).await.unwrap();
        reporter
            .publish("dispatching 3 missions", Some(json!({"missions": 3})))
            .await
            .unwrap();

        let record = reporter.read().await.unwrap().unwrap();
        assert!(record.active);
        assert_eq!(record.message, "dispatching 3 missions");
        assert_eq!(record.details, Some(json!({"missions": 3})));

        // Still exactly one record file.
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let reporter = FileStatusReporter::new(dir.path().join("status.json"));

        reporter.publish("working", None).await.unwrap();
        reporter.clear().await.unwrap();
        reporter.clear().await.unwrap();

        assert!(reporter.read().await.unwrap().is_none());
    }
}
