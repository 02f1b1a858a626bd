//! Error types for network operations

use narrivo_core::{AppError, DownloadError};
use narrivo_library::LibraryError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No such download job
    #[error("Download job not found: {0}")]
    JobNotFound(String),

    /// Registry lookup or update failed
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl NetworkError {
    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        match self {
            NetworkError::HttpStatus { status, .. } => (400..500).contains(status),
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_client_error()),
            _ => false,
        }
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        match self {
            NetworkError::HttpStatus { status, .. } => (500..600).contains(status),
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }

    /// Classifies the error as a network or storage fault
    pub fn to_download_error(&self) -> DownloadError {
        match self {
            NetworkError::HttpStatus { status, url } => DownloadError::HttpStatus {
                status: *status,
                url: url.clone(),
            },
            NetworkError::Io(e) => DownloadError::Storage {
                message: e.to_string(),
            },
            other => DownloadError::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Library(e) => e.into(),
            NetworkError::JobNotFound(id) => AppError::NotFound {
                entity: "Download job".to_string(),
                id,
            },
            NetworkError::InvalidUrl(url) => AppError::InvalidArgument {
                argument: "url".to_string(),
                reason: url,
            },
            other => AppError::Download(other.to_download_error()),
        }
    }
}
