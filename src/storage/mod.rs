//! Storage abstractions for scan result persistence.
//!
//! A run produces one JSON array of [`ScanResult`] records, one per
//! configured link in configuration order. The file is replaced wholesale
//! on every run so a reader never sees a half-written array.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ScanResult;

// Re-export for convenience
pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Records written
    pub total: usize,
    /// Records with an earliest date
    pub found: usize,
    /// Records with an error
    pub failed: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

impl WriteSummary {
    pub fn of(results: &[ScanResult]) -> Self {
        Self {
            total: results.len(),
            found: results.iter().filter(|r| r.is_found()).count(),
            failed: results.iter().filter(|r| r.is_error()).count(),
            timestamp: Utc::now(),
        }
    }

    /// Records that were scanned cleanly but had no qualifying day.
    pub fn exhausted(&self) -> usize {
        self.total - self.found - self.failed
    }
}

/// Trait for result storage backends.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    /// Replace the stored results with this run's records.
    async fn write_results(&self, results: &[ScanResult]) -> Result<WriteSummary>;

    /// Load the last written results; empty when nothing was written yet.
    async fn load_results(&self) -> Result<Vec<ScanResult>>;
}
