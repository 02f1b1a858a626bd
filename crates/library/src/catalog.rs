//! Known public-domain books used to seed the library

use narrivo_core::{AssetKind, AssetRef, Book, BookId, BookSource};

/// Supplies a static list of books
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    fn books(&self) -> Vec<Book>;
}

/// A catalog backed by a fixed list
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    name: String,
    books: Vec<Book>,
}

impl StaticCatalog {
    pub fn new(name: impl Into<String>, books: Vec<Book>) -> Self {
        Self {
            name: name.into(),
            books,
        }
    }

    /// LibriVox recordings and Project Gutenberg texts
    pub fn public_domain() -> Self {
        let books = vec![
            catalog_book(
                "catalog-great-gatsby",
                "The Great Gatsby",
                "F. Scott Fitzgerald",
                "https://upload.wikimedia.org/wikipedia/commons/7/7a/The_Great_Gatsby_Cover_1925_Retouched.jpg",
                Some("https://ia800207.us.archive.org/27/items/great_gatsby_1603_librivox/greatgatsby_01_fitzgerald_128kb.mp3"),
                Some("https://www.gutenberg.org/cache/epub/64317/pg64317.txt"),
                1800.0,
            ),
            catalog_book(
                "catalog-sherlock-holmes",
                "Sherlock Holmes",
                "Arthur Conan Doyle",
                "https://upload.wikimedia.org/wikipedia/commons/b/b9/Caspar_David_Friedrich_-_Wanderer_above_the_sea_of_fog.jpg",
                Some("https://ia801407.us.archive.org/23/items/adventures_sherlock_holmes_librivox/adventures_of_sherlock_holmes_01_doyle_128kb.mp3"),
                None,
                1500.0,
            ),
            catalog_book(
                "catalog-alice-in-wonderland",
                "Alice in Wonderland",
                "Lewis Carroll",
                "https://upload.wikimedia.org/wikipedia/commons/6/65/Alice%27s_Adventures_in_Wonderland_cover_%281865%29.jpg",
                None,
                Some("https://www.gutenberg.org/cache/epub/11/pg11.txt"),
                0.0,
            ),
        ];
        Self::new("public-domain", books)
    }
}

fn catalog_book(
    id: &str,
    title: &str,
    author: &str,
    cover: &str,
    audio_url: Option<&str>,
    text_url: Option<&str>,
    duration_seconds: f64,
) -> Book {
    let mut book = Book::new(BookId::new(id), title, author, BookSource::Catalog)
        .with_cover(cover)
        .with_duration(duration_seconds);
    if let Some(url) = audio_url {
        book.set_asset(AssetKind::Audio, AssetRef::remote(url));
    }
    if let Some(url) = text_url {
        book.set_asset(AssetKind::Text, AssetRef::remote(url));
    }
    book
}

impl Catalog for StaticCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn books(&self) -> Vec<Book> {
        self.books.clone()
    }
}
