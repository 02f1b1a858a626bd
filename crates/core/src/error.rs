//! Error taxonomy and recovery strategies for Narrivo
//!
//! Errors are grouped by the component that raises them. Each one maps to a
//! severity tier and a recovery action:
//! - **Recoverable**: the operation can simply be repeated
//! - **Degraded**: one feature or asset is unavailable, the rest keeps working
//! - **Fatal**: user intervention is required
//!
//! An ambiguous import match is not an error; it is reported through
//! `MatchResult::needs_confirmation`.

use std::fmt;
use std::io;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately
    RetryImmediate,
    /// Nothing to do now; the write is repeated on the next mutation
    RetryOnNextMutation,
    /// Start the download again; partial data is already gone
    RestartAcquisition,
    /// Load the track again
    ReloadTrack,
    /// Pick a different file
    ChooseDifferentFile,
    /// No automatic recovery
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryOnNextMutation => write!(f, "Retrying on next change"),
            Self::RestartAcquisition => write!(f, "Restart the download"),
            Self::ReloadTrack => write!(f, "Reload the track"),
            Self::ChooseDifferentFile => write!(f, "Choose a different file"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Feature degraded but app can continue
    Degraded,
    /// Critical error requiring user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Failure to turn a picked file into a library entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Unsupported file type: {filename}")]
    UnsupportedFileType { filename: String },

    #[error("Could not infer a title from {filename}")]
    MissingTitle { filename: String },
}

/// Network or storage fault during asset acquisition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

/// Media backend fault
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Failed to load {uri}: {message}")]
    LoadFailed { uri: String, message: String },

    #[error("Media backend error: {message}")]
    Backend { message: String },

    #[error("Book has no audio asset: {book_id}")]
    NoAudioAsset { book_id: String },
}

/// Failure of the key/value persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },

    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },

    #[error("Stored value for '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Main error type for Narrivo
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Entity not present in the library
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// General I/O error
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },
}

impl AppError {
    /// Shorthand for a missing book
    pub fn book_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Book".to_string(),
            id: id.into(),
        }
    }

    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Persistence(_) | Self::Download(DownloadError::Network { .. }) => {
                ErrorSeverity::Recoverable
            }

            Self::Import(_)
            | Self::Download(_)
            | Self::Playback(_)
            | Self::NotFound { .. }
            | Self::InvalidArgument { .. } => ErrorSeverity::Degraded,

            Self::Io { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::Persistence(PersistenceError::Write { .. }) => {
                RecoveryAction::RetryOnNextMutation
            }
            Self::Persistence(_) => RecoveryAction::RetryImmediate,
            Self::Download(_) => RecoveryAction::RestartAcquisition,
            Self::Playback(PlaybackError::NoAudioAsset { .. }) => {
                RecoveryAction::UserIntervention
            }
            Self::Playback(_) => RecoveryAction::ReloadTrack,
            Self::Import(_) => RecoveryAction::ChooseDifferentFile,
            Self::NotFound { .. } | Self::InvalidArgument { .. } | Self::Io { .. } => {
                RecoveryAction::UserIntervention
            }
        }
    }

    /// Returns a user-friendly error message suitable for display in the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::Import(ImportError::UnsupportedFileType { .. }) => {
                "This file type is not supported. Pick an audio file or an ebook.".to_string()
            }
            Self::Import(ImportError::MissingTitle { .. }) => {
                "Cannot work out a title from this file name.".to_string()
            }
            Self::Download(DownloadError::Network { .. }) => {
                "Cannot connect to the internet. Please check your connection.".to_string()
            }
            Self::Download(DownloadError::HttpStatus { .. }) => {
                "The server refused the download. Please try again later.".to_string()
            }
            Self::Download(DownloadError::Storage { .. }) => {
                "Cannot save the download. Please free up some space and try again.".to_string()
            }
            Self::Playback(PlaybackError::NoAudioAsset { .. }) => {
                "This book has no audio to play.".to_string()
            }
            Self::Playback(_) => {
                "Cannot play this audio file. It may be corrupted or unavailable.".to_string()
            }
            Self::Persistence(_) => {
                "Your library could not be saved. It will be saved again on the next change."
                    .to_string()
            }
            Self::NotFound { .. } => "The requested item was not found.".to_string(),
            Self::InvalidArgument { argument, .. } => format!("Invalid value for {}.", argument),
            Self::Io { .. } => "A file operation failed. Please try again.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryOnNextMutation
        )
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
