//! Turning a picked file into either a merge or a new book

use crate::matcher::{ImportCandidate, ImportMatcher, MatchMethod, MatchResult, SimilarityMetric};
use crate::metadata::file_kind;
use log::{debug, info};
use narrivo_core::{AssetKind, AssetRef, Book, BookId, BookSource, ImportError};

/// What importing a candidate does to the library
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Bind the asset to an existing book
    Merge {
        book_id: BookId,
        kind: AssetKind,
        asset: AssetRef,
        result: MatchResult,
    },
    /// Add a new book
    Create { book: Book },
}

impl ImportOutcome {
    /// True for fuzzy merges the user should confirm first
    pub fn needs_confirmation(&self) -> bool {
        match self {
            ImportOutcome::Merge { result, .. } => result.needs_confirmation,
            ImportOutcome::Create { .. } => false,
        }
    }

    /// Id of the book the import ends up in
    pub fn book_id(&self) -> &BookId {
        match self {
            ImportOutcome::Merge { book_id, .. } => book_id,
            ImportOutcome::Create { book } => &book.id,
        }
    }
}

/// Cover reference for books created from user files
pub fn generated_cover(id: &BookId) -> String {
    format!("generated:{}", id)
}

/// Decides how `candidate` enters the library
///
/// Unsupported file types come back as a typed error; matching itself
/// cannot fail.
pub fn process_import<M: SimilarityMetric>(
    candidate: &ImportCandidate,
    books: &[Book],
    matcher: &ImportMatcher<M>,
) -> Result<ImportOutcome, ImportError> {
    let kind = file_kind(&candidate.filename).ok_or_else(|| ImportError::UnsupportedFileType {
        filename: candidate.filename.clone(),
    })?;

    if candidate.inferred_title.trim().is_empty() {
        return Err(ImportError::MissingTitle {
            filename: candidate.filename.clone(),
        });
    }

    let asset = AssetRef::local(candidate.content_handle.clone());
    let result = matcher.find_match(candidate, books);
    debug!(
        "Match for {}: {:?} ({:.2})",
        candidate.filename, result.method, result.confidence
    );

    match (result.method, result.matched_book_id.clone()) {
        (MatchMethod::Exact | MatchMethod::Fuzzy, Some(book_id)) => Ok(ImportOutcome::Merge {
            book_id,
            kind,
            asset,
            result,
        }),
        _ => {
            let id = BookId::generate();
            info!(
                "No match for {}, creating book {}",
                candidate.filename, id
            );
            let book = Book::new(
                id.clone(),
                candidate.inferred_title.clone(),
                candidate.inferred_author.clone(),
                BookSource::User,
            )
            .with_cover(generated_cover(&id))
            .with_asset(kind, asset);
            Ok(ImportOutcome::Create { book })
        }
    }
}
