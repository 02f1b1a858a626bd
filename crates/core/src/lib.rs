//! Narrivo core domain model
//!
//! Books and their assets, bookmarks, the error taxonomy shared by every
//! component, and the observer registry used to push snapshots to the UI.

pub mod error;
pub mod observer;
pub mod types;

pub use error::{
    AppError, DownloadError, ErrorSeverity, ImportError, PersistenceError, PlaybackError,
    RecoveryAction, Result,
};
pub use observer::{Observers, SubscriptionId};
pub use types::{
    format_clock, AcquisitionState, AssetKind, AssetRef, AssetState, AssetUpdate, Book, BookId,
    BookSource, Bookmark, BookmarkId, BookmarkKind, DerivedType, PlaybackRate, Timestamp,
    Validator,
};
