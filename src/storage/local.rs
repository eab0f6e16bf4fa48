//! Local filesystem storage implementation.
//!
//! Results are written as a pretty-printed JSON array to a single file,
//! by writing a sibling temp file and renaming it over the target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ScanResult;
use crate::storage::{ResultStorage, WriteSummary};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage writing to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl ResultStorage for LocalStorage {
    async fn write_results(&self, results: &[ScanResult]) -> Result<WriteSummary> {
        let mut bytes = serde_json::to_vec_pretty(results)?;
        bytes.push(b'\n');
        self.write_bytes(&bytes).await?;

        let summary = WriteSummary::of(results);
        log::info!(
            "Wrote {} results to {} ({} found, {} exhausted, {} failed)",
            summary.total,
            self.path.display(),
            summary.found,
            summary.exhausted(),
            summary.failed
        );
        Ok(summary)
    }

    async fn load_results(&self) -> Result<Vec<ScanResult>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::models::LinkTarget;

    fn sample() -> Vec<ScanResult> {
        let link = LinkTarget::new("Sales", "https://acme.example/sales");
        let date = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        vec![
            ScanResult::found(&link, date, 4, today),
            ScanResult::exhausted(&LinkTarget::new("Support", "https://acme.example/s"), "none"),
            ScanResult::failed(&LinkTarget::new("Broken", "https://nope.example"), "boom"),
        ]
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("out/availability.json"));

        let summary = storage.write_results(&sample()).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.found, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exhausted(), 1);

        let loaded = storage.load_results().await.unwrap();
        let names: Vec<_> = loaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "Support", "Broken"]);
        assert_eq!(loaded[0].days_from_today, Some(3));
        assert_eq!(loaded[1].note.as_deref(), Some("none"));
        assert!(!dir.path().join("out/availability.tmp").exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_previous_run() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("availability.json"));
        storage.write_results(&sample()).await.unwrap();
        storage.write_results(&sample()[..1]).await.unwrap();
        assert_eq!(storage.load_results().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("none.json"));
        assert!(storage.load_results().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_field_names() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("availability.json"));
        storage.write_results(&sample()).await.unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let first = &value[0];
        assert_eq!(first["earliestDate"], "2025-10-20");
        assert_eq!(first["slotCountObserved"], 4);
        assert!(first.get("note").is_none());
        assert_eq!(value[1]["earliestDate"], serde_json::Value::Null);
        assert_eq!(value[2]["error"], "boom");
    }
}
