//! Canonical store of library entries
//!
//! `BookRegistry` is the only writer of books. Every mutation clones the
//! affected record, applies the change, recomputes the derived fields and
//! swaps the record into place in one step. The full list is then persisted
//! and only after that are observers notified, so readers never see a
//! partially merged book.
//!
//! A failed write is logged and marks the registry dirty; since every write
//! stores the whole list, the next mutation (or an explicit `flush`) retries
//! it.

use crate::catalog::Catalog;
use crate::error::{LibraryError, LibraryResult};
use crate::import::ImportOutcome;
use crate::store::KeyValueStore;
use log::{debug, info, warn};
use narrivo_core::{
    AssetKind, AssetRef, AssetState, AssetUpdate, Book, BookId, Bookmark, BookmarkId,
    Observers, SubscriptionId, Validator,
};
use std::sync::Arc;

/// Key the book list is persisted under
pub const BOOKS_KEY: &str = "narrivo_books";

pub struct BookRegistry {
    books: Vec<Book>,
    store: Arc<dyn KeyValueStore>,
    observers: Observers<Vec<Book>>,
    dirty: bool,
}

impl BookRegistry {
    /// Creates an empty registry
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            books: Vec::new(),
            store,
            observers: Observers::new(),
            dirty: false,
        }
    }

    /// Loads the persisted library
    ///
    /// A corrupt payload yields an empty library; read failures are
    /// returned.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> LibraryResult<Self> {
        let mut registry = Self::new(store);

        let Some(payload) = registry.store.get(BOOKS_KEY).await? else {
            info!("No saved library, starting empty");
            return Ok(registry);
        };

        match serde_json::from_str::<Vec<Book>>(&payload) {
            Ok(mut books) => {
                for book in &mut books {
                    book.refresh();
                }
                info!("Loaded {} books", books.len());
                registry.books = books;
            }
            Err(e) => warn!("Saved library is corrupt, starting empty: {}", e),
        }

        Ok(registry)
    }

    /// Snapshot of every book
    pub fn all(&self) -> Vec<Book> {
        self.books.clone()
    }

    /// Borrowed view of every book
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, id: &BookId) -> Option<&Book> {
        self.books.iter().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BookId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// True while the last persistence write failed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Registers an observer called with the full book list after each change
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Vec<Book>) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Inserts a book or replaces the record with the same id
    pub async fn upsert(&mut self, mut book: Book) -> LibraryResult<()> {
        book.refresh();
        if let Err(reasons) = book.validate() {
            return Err(LibraryError::InvalidBook {
                id: book.id.to_string(),
                reasons: reasons.join("; "),
            });
        }

        match self.books.iter().position(|b| b.id == book.id) {
            Some(index) => {
                debug!("Replacing book {}", book.id);
                self.books[index] = book;
            }
            None => {
                info!("Adding book {} ({})", book.id, book.title);
                self.books.push(book);
            }
        }

        self.commit().await;
        Ok(())
    }

    /// Merges asset refs into an existing book, keeping its id
    pub async fn merge_assets(&mut self, id: &BookId, update: AssetUpdate) -> LibraryResult<Book> {
        let book = self.mutate(id, |book| book.merge_assets(update)).await?;
        info!("Merged assets into {} ({})", book.id, book.derived_type());
        Ok(book)
    }

    /// Changes the state of one asset
    pub async fn set_asset_state(
        &mut self,
        id: &BookId,
        kind: AssetKind,
        state: AssetState,
    ) -> LibraryResult<Book> {
        let book = self
            .mutate(id, |book| {
                book.set_asset_state(kind, state);
            })
            .await?;
        debug!(
            "Book {} {} asset -> {:?}, book {}",
            id,
            kind,
            state,
            book.acquisition_state()
        );
        Ok(book)
    }

    /// Restores one asset slot to an earlier value, `None` emptying it
    pub async fn restore_asset(
        &mut self,
        id: &BookId,
        kind: AssetKind,
        asset: Option<AssetRef>,
    ) -> LibraryResult<Book> {
        let book = self
            .mutate(id, |book| book.restore_asset(kind, asset))
            .await?;
        debug!("Book {} {} asset restored, book {}", id, kind, book.derived_type());
        Ok(book)
    }

    /// Removes a book on explicit request
    pub async fn delete(&mut self, id: &BookId) -> LibraryResult<Book> {
        let index = self
            .books
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| LibraryError::BookNotFound(id.to_string()))?;

        let removed = self.books.remove(index);
        info!("Deleted book {} ({})", removed.id, removed.title);
        self.commit().await;
        Ok(removed)
    }

    /// Records the resume position
    pub async fn update_position(&mut self, id: &BookId, seconds: f64) -> LibraryResult<Book> {
        self.mutate(id, |book| book.set_position(seconds)).await
    }

    /// Records the duration once the media backend knows it
    pub async fn set_duration(&mut self, id: &BookId, seconds: f64) -> LibraryResult<Book> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(LibraryError::InvalidBook {
                id: id.to_string(),
                reasons: format!("invalid duration {}", seconds),
            });
        }
        self.mutate(id, |book| {
            book.duration_seconds = seconds;
            let position = book.last_position_seconds;
            book.set_position(position);
        })
        .await
    }

    pub async fn add_bookmark(&mut self, id: &BookId, bookmark: Bookmark) -> LibraryResult<Book> {
        if let Err(reasons) = bookmark.validate() {
            return Err(LibraryError::InvalidBook {
                id: id.to_string(),
                reasons: reasons.join("; "),
            });
        }
        self.mutate(id, |book| book.add_bookmark(bookmark)).await
    }

    pub async fn remove_bookmark(
        &mut self,
        id: &BookId,
        bookmark_id: BookmarkId,
    ) -> LibraryResult<Option<Bookmark>> {
        let mut removed = None;
        self.mutate(id, |book| removed = book.remove_bookmark(bookmark_id))
            .await?;
        Ok(removed)
    }

    /// Applies a processed import; returns the id of the affected book
    pub async fn apply_import(&mut self, outcome: ImportOutcome) -> LibraryResult<BookId> {
        match outcome {
            ImportOutcome::Merge {
                book_id,
                kind,
                asset,
                ..
            } => {
                self.merge_assets(&book_id, AssetUpdate::single(kind, asset))
                    .await?;
                Ok(book_id)
            }
            ImportOutcome::Create { book } => {
                let id = book.id.clone();
                self.upsert(book).await?;
                Ok(id)
            }
        }
    }

    /// Adds catalog books whose ids are not yet present
    ///
    /// Returns the number of books added; re-seeding adds nothing.
    pub async fn seed(&mut self, catalog: &dyn Catalog) -> LibraryResult<usize> {
        let mut added = 0;
        for mut book in catalog.books() {
            if self.contains(&book.id) {
                continue;
            }
            book.refresh();
            self.books.push(book);
            added += 1;
        }

        if added > 0 {
            info!("Seeded {} books from {}", added, catalog.name());
            self.commit().await;
        }
        Ok(added)
    }

    /// Writes the full list now, returning the write error if any
    pub async fn flush(&mut self) -> LibraryResult<()> {
        self.persist().await?;
        self.dirty = false;
        Ok(())
    }

    async fn mutate<F>(&mut self, id: &BookId, apply: F) -> LibraryResult<Book>
    where
        F: FnOnce(&mut Book),
    {
        let index = self
            .books
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| LibraryError::BookNotFound(id.to_string()))?;

        let mut updated = self.books[index].clone();
        apply(&mut updated);
        updated.refresh();
        self.books[index] = updated.clone();

        self.commit().await;
        Ok(updated)
    }

    async fn persist(&self) -> LibraryResult<()> {
        let payload = serde_json::to_string(&self.books)?;
        self.store.set(BOOKS_KEY, &payload).await?;
        Ok(())
    }

    async fn commit(&mut self) {
        match self.persist().await {
            Ok(()) => {
                if self.dirty {
                    info!("Library persisted after earlier failure");
                }
                self.dirty = false;
            }
            Err(e) => {
                warn!("Failed to persist library, will retry on next change: {}", e);
                self.dirty = true;
            }
        }
        self.observers.notify(&self.books);
    }
}

impl std::fmt::Debug for BookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookRegistry")
            .field("books", &self.books.len())
            .field("dirty", &self.dirty)
            .field("observers", &self.observers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use narrivo_core::{BookSource, DerivedType};
    use std::sync::Mutex;

    fn text_book(id: &str) -> Book {
        Book::new(BookId::new(id), "Alice in Wonderland", "Lewis Carroll", BookSource::User)
            .with_asset(AssetKind::Text, AssetRef::local("alice.epub"))
    }

    #[tokio::test]
    async fn test_upsert_persists_before_notify() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = BookRegistry::new(store.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer_store = store.clone();
        let observer_seen = seen.clone();
        registry.subscribe(move |books| {
            let persisted = observer_store.peek(BOOKS_KEY).is_some();
            observer_seen.lock().unwrap().push((books.len(), persisted));
        });

        registry.upsert(text_book("b1")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, true)]);
    }

    #[tokio::test]
    async fn test_upsert_rejects_book_without_assets() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        let book = Book::new(BookId::new("x"), "Title", "Author", BookSource::User);
        assert!(matches!(
            registry.upsert(book).await,
            Err(LibraryError::InvalidBook { .. })
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_merge_assets_keeps_id_and_other_slot() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        registry.upsert(text_book("b1")).await.unwrap();

        let book = registry
            .merge_assets(
                &BookId::new("b1"),
                AssetUpdate::single(AssetKind::Audio, AssetRef::local("alice.mp3")),
            )
            .await
            .unwrap();

        assert_eq!(book.id, BookId::new("b1"));
        assert_eq!(book.derived_type(), DerivedType::Hybrid);
        assert_eq!(book.text_asset(), Some(&AssetRef::local("alice.epub")));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_book() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        let result = registry.update_position(&BookId::new("nope"), 10.0).await;
        assert!(matches!(result, Err(LibraryError::BookNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_write_is_retried_on_next_mutation() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = BookRegistry::new(store.clone());

        store.set_fail_writes(true);
        registry.upsert(text_book("b1")).await.unwrap();
        assert!(registry.is_dirty());
        assert_eq!(store.peek(BOOKS_KEY), None);

        store.set_fail_writes(false);
        registry
            .update_position(&BookId::new("b1"), 12.0)
            .await
            .unwrap();
        assert!(!registry.is_dirty());
        assert!(store.peek(BOOKS_KEY).unwrap().contains("\"b1\""));
    }

    #[tokio::test]
    async fn test_flush_reports_write_error() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = BookRegistry::new(store.clone());
        store.set_fail_writes(true);

        assert!(matches!(
            registry.flush().await,
            Err(LibraryError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_load_corrupt_payload_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(BOOKS_KEY, "{not json").await.unwrap();

        let registry = BookRegistry::load(store).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_bookmarks() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        registry.upsert(text_book("b1")).await.unwrap();
        let id = BookId::new("b1");

        let bookmark = Bookmark::audio(30.0).with_label("Chapter 2");
        let bookmark_id = bookmark.id;
        registry.add_bookmark(&id, Bookmark::audio(60.0)).await.unwrap();
        let book = registry.add_bookmark(&id, bookmark).await.unwrap();
        assert_eq!(book.bookmarks()[0].id, bookmark_id);

        let removed = registry.remove_bookmark(&id, bookmark_id).await.unwrap();
        assert!(removed.is_some());
        assert_eq!(registry.get(&id).unwrap().bookmarks().len(), 1);
    }

    #[tokio::test]
    async fn test_set_duration_clamps_position() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        registry.upsert(text_book("b1")).await.unwrap();
        let id = BookId::new("b1");

        registry.update_position(&id, 500.0).await.unwrap();
        let book = registry.set_duration(&id, 300.0).await.unwrap();
        assert_eq!(book.last_position_seconds, 300.0);
        assert!(registry.set_duration(&id, f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let mut registry = BookRegistry::new(Arc::new(MemoryStore::new()));
        registry.upsert(text_book("b1")).await.unwrap();

        let removed = registry.delete(&BookId::new("b1")).await.unwrap();
        assert_eq!(removed.id, BookId::new("b1"));
        assert!(registry.delete(&BookId::new("b1")).await.is_err());
    }
}
