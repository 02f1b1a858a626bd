use narrivo_core::{AppError, ImportError, PersistenceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Invalid book {id}: {reasons}")]
    InvalidBook { id: String, reasons: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Import(e) => AppError::Import(e),
            LibraryError::Persistence(e) => AppError::Persistence(e),
            LibraryError::BookNotFound(id) => AppError::book_not_found(id),
            LibraryError::InvalidBook { id, reasons } => AppError::InvalidArgument {
                argument: format!("book {}", id),
                reason: reasons,
            },
            LibraryError::Serialization(e) => AppError::InvalidArgument {
                argument: "library payload".to_string(),
                reason: e.to_string(),
            },
        }
    }
}

// Both type aliases for convenience
pub type Result<T> = std::result::Result<T, LibraryError>;
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
