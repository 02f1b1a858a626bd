use narrivo_core::{AppError, PlaybackError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Book has no audio asset: {0}")]
    NoAudioAsset(String),

    #[error(transparent)]
    Backend(#[from] PlaybackError),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoAudioAsset(book_id) => PlaybackError::NoAudioAsset { book_id }.into(),
            EngineError::Backend(e) => e.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
