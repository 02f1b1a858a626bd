//! Domain types for Narrivo
//!
//! - `book`: books, asset refs and the derived classification
//! - `bookmark`: user bookmarks
//! - `playback`: playback rate
//! - `common`: shared traits and utilities

mod book;
mod bookmark;
mod common;
mod playback;

pub use book::{
    AcquisitionState, AssetKind, AssetRef, AssetState, AssetUpdate, Book, BookId, BookSource,
    DerivedType,
};
pub use bookmark::{Bookmark, BookmarkId, BookmarkKind};
pub use common::{format_clock, Timestamp, Validator};
pub use playback::{PlaybackRate, MAX_RATE, MIN_RATE};
