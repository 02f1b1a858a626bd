//! Narrivo library management
//!
//! Import matching, the canonical book registry and its persistence, and
//! catalog seeding.

pub mod catalog;
pub mod error;
pub mod import;
pub mod matcher;
pub mod metadata;
pub mod registry;
pub mod store;

pub use catalog::{Catalog, StaticCatalog};
pub use error::{LibraryError, LibraryResult};
pub use import::{process_import, ImportOutcome};
pub use matcher::{
    CharacterJaccard, ImportCandidate, ImportMatcher, MatchMethod, MatchResult, MatchThresholds,
    SimilarityMetric,
};
pub use metadata::{extract_metadata, file_kind, FileMetadata};
pub use registry::{BookRegistry, BOOKS_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore};
