//! Bookmark domain model

use crate::types::{Timestamp, Validator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a bookmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookmarkId(Uuid);

impl BookmarkId {
    /// Creates a new random BookmarkId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a BookmarkId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the BookmarkId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BookmarkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which medium a bookmark position refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkKind {
    /// Position is seconds into the audio
    Audio,
    /// Position is a text unit (paragraph) index
    Text,
}

/// A user bookmark inside a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub kind: BookmarkKind,
    pub position: f64,
    pub label: Option<String>,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl Bookmark {
    /// Creates an audio bookmark at `seconds`
    pub fn audio(seconds: f64) -> Self {
        Self::new(BookmarkKind::Audio, seconds)
    }

    /// Creates a text bookmark at unit `index`
    pub fn text(index: usize) -> Self {
        Self::new(BookmarkKind::Text, index as f64)
    }

    fn new(kind: BookmarkKind, position: f64) -> Self {
        Self {
            id: BookmarkId::new(),
            kind,
            position,
            label: None,
            note: None,
            created_at: Timestamp::now(),
        }
    }

    /// Attaches a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches a free-form note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl Validator for Bookmark {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.position.is_finite() || self.position < 0.0 {
            errors.push("Bookmark position must be a non-negative number".to_string());
        }

        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                errors.push("Bookmark label cannot be blank".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_id_roundtrip() {
        let id = BookmarkId::new();
        let parsed = BookmarkId::from_string(&id.as_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_audio_bookmark() {
        let bookmark = Bookmark::audio(42.5).with_label("Rabbit hole");
        assert_eq!(bookmark.kind, BookmarkKind::Audio);
        assert_eq!(bookmark.position, 42.5);
        assert_eq!(bookmark.label.as_deref(), Some("Rabbit hole"));
        assert!(bookmark.is_valid());
    }

    #[test]
    fn test_text_bookmark() {
        let bookmark = Bookmark::text(7).with_note("re-read");
        assert_eq!(bookmark.kind, BookmarkKind::Text);
        assert_eq!(bookmark.position, 7.0);
    }

    #[test]
    fn test_negative_position_invalid() {
        assert!(!Bookmark::audio(-1.0).is_valid());
        assert!(!Bookmark::audio(f64::NAN).is_valid());
    }

    #[test]
    fn test_blank_label_invalid() {
        assert!(!Bookmark::audio(1.0).with_label("  ").is_valid());
    }
}
