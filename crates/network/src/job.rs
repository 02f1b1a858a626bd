//! Download job model

use crate::progress::DownloadProgress;
use chrono::{DateTime, Utc};
use narrivo_core::{AssetKind, BookId, DownloadError};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a download job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Completed,
    Error(DownloadError),
    Cancelled,
}

impl DownloadStatus {
    /// True for the three final states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Error(_) | DownloadStatus::Cancelled
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::Pending => write!(f, "PENDING"),
            DownloadStatus::Running => write!(f, "RUNNING"),
            DownloadStatus::Completed => write!(f, "COMPLETED"),
            DownloadStatus::Error(e) => write!(f, "ERROR ({})", e),
            DownloadStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One asset acquisition
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: JobId,
    pub book_id: BookId,
    pub asset_kind: AssetKind,
    pub url: String,
    pub destination: PathBuf,
    pub status: DownloadStatus,
    pub progress: DownloadProgress,
    pub started_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(book_id: BookId, asset_kind: AssetKind, url: String, destination: PathBuf) -> Self {
        Self {
            id: JobId::new(),
            book_id,
            asset_kind,
            url,
            destination,
            status: DownloadStatus::Pending,
            progress: DownloadProgress::new(None),
            started_at: Utc::now(),
        }
    }

    pub fn bytes_done(&self) -> u64 {
        self.progress.downloaded_bytes
    }

    pub fn bytes_total(&self) -> Option<u64> {
        self.progress.total_bytes
    }

    /// Completed fraction, if the size is known
    pub fn fraction(&self) -> Option<f64> {
        self.progress.fraction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = DownloadJob::new(
            BookId::new("b1"),
            AssetKind::Audio,
            "https://example.com/a.mp3".to_string(),
            PathBuf::from("/tmp/a.mp3"),
        );
        assert_eq!(job.status, DownloadStatus::Pending);
        assert_eq!(job.bytes_done(), 0);
        assert_eq!(job.fraction(), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::Running.is_terminal());
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Cancelled.is_terminal());
        assert!(DownloadStatus::Error(DownloadError::Network {
            message: "reset".to_string()
        })
        .is_terminal());
    }
}
