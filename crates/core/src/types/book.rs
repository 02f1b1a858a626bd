//! Book and asset domain models

use crate::types::{Bookmark, BookmarkId, BookmarkKind, Timestamp, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a book
///
/// Catalog books carry stable ids from the catalog; user imports get a
/// generated `user-<millis>-<suffix>` id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// Wraps an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id for a user-imported book
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "user-{}-{}",
            Timestamp::now().as_millis(),
            &suffix[..9]
        ))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BookId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The two kinds of asset a book can bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Audio,
    Text,
}

impl AssetKind {
    /// Both kinds, audio first
    pub const ALL: [AssetKind; 2] = [AssetKind::Audio, AssetKind::Text];
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Audio => write!(f, "audio"),
            AssetKind::Text => write!(f, "text"),
        }
    }
}

/// Local availability of one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    /// Only known by its remote URL
    Remote,
    /// A download job is running for it
    Acquiring,
    /// Available locally at `uri`
    Ready,
    /// The last download attempt failed; `uri` is still the remote URL
    Failed,
}

/// A concrete audio or text resource bound to a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub uri: String,
    pub state: AssetState,
}

impl AssetRef {
    /// An asset already available on this device
    pub fn local(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            state: AssetState::Ready,
        }
    }

    /// An asset that still has to be acquired from `url`
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            uri: url.into(),
            state: AssetState::Remote,
        }
    }

    /// Returns true if the asset is available locally
    pub fn is_ready(&self) -> bool {
        self.state == AssetState::Ready
    }
}

/// Classification derived from which assets a book has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DerivedType {
    Audio,
    Ebook,
    Hybrid,
}

impl DerivedType {
    /// Computes the type from asset presence
    ///
    /// A book without any asset reads as `Ebook`; such a book never passes
    /// validation, so this only matters for transient records.
    pub fn from_presence(has_audio: bool, has_text: bool) -> Self {
        match (has_audio, has_text) {
            (true, true) => DerivedType::Hybrid,
            (true, false) => DerivedType::Audio,
            _ => DerivedType::Ebook,
        }
    }

    /// Asset kinds that must be ready for a book of this type to be ready
    pub fn required_kinds(&self) -> &'static [AssetKind] {
        match self {
            DerivedType::Audio => &[AssetKind::Audio],
            DerivedType::Ebook => &[AssetKind::Text],
            DerivedType::Hybrid => &AssetKind::ALL,
        }
    }
}

impl fmt::Display for DerivedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedType::Audio => write!(f, "AUDIO"),
            DerivedType::Ebook => write!(f, "EBOOK"),
            DerivedType::Hybrid => write!(f, "HYBRID"),
        }
    }
}

/// Where a book entered the library from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookSource {
    User,
    Catalog,
}

/// Book-level acquisition state, derived from the required assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionState {
    NotAcquired,
    Acquiring,
    Ready,
    Error,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::NotAcquired => write!(f, "NOT_ACQUIRED"),
            AcquisitionState::Acquiring => write!(f, "ACQUIRING"),
            AcquisitionState::Ready => write!(f, "READY"),
            AcquisitionState::Error => write!(f, "ERROR"),
        }
    }
}

/// Asset refs to merge into a book; `None` leaves that slot untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetUpdate {
    pub audio: Option<AssetRef>,
    pub text: Option<AssetRef>,
}

impl AssetUpdate {
    /// Update touching only the `kind` slot
    pub fn single(kind: AssetKind, asset: AssetRef) -> Self {
        match kind {
            AssetKind::Audio => Self {
                audio: Some(asset),
                text: None,
            },
            AssetKind::Text => Self {
                audio: None,
                text: Some(asset),
            },
        }
    }
}

/// A canonical library entry unifying zero or more assets
///
/// Asset slots, `derived_type` and `acquisition_state` are private: every
/// change goes through methods that recompute the derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub cover_ref: String,
    audio_asset: Option<AssetRef>,
    text_asset: Option<AssetRef>,
    derived_type: DerivedType,
    pub source: BookSource,
    acquisition_state: AcquisitionState,
    pub last_position_seconds: f64,
    pub duration_seconds: f64,
    #[serde(default)]
    bookmarks: Vec<Bookmark>,
    pub added_at: Timestamp,
}

impl Book {
    /// Creates a book without assets
    pub fn new(
        id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
        source: BookSource,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            cover_ref: String::new(),
            audio_asset: None,
            text_asset: None,
            derived_type: DerivedType::Ebook,
            source,
            acquisition_state: AcquisitionState::NotAcquired,
            last_position_seconds: 0.0,
            duration_seconds: 0.0,
            bookmarks: Vec::new(),
            added_at: Timestamp::now(),
        }
    }

    /// Sets the cover reference
    pub fn with_cover(mut self, cover_ref: impl Into<String>) -> Self {
        self.cover_ref = cover_ref.into();
        self
    }

    /// Binds an asset
    pub fn with_asset(mut self, kind: AssetKind, asset: AssetRef) -> Self {
        self.set_asset(kind, asset);
        self
    }

    /// Sets the known duration
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn audio_asset(&self) -> Option<&AssetRef> {
        self.audio_asset.as_ref()
    }

    pub fn text_asset(&self) -> Option<&AssetRef> {
        self.text_asset.as_ref()
    }

    /// Returns the asset in the `kind` slot
    pub fn asset(&self, kind: AssetKind) -> Option<&AssetRef> {
        match kind {
            AssetKind::Audio => self.audio_asset.as_ref(),
            AssetKind::Text => self.text_asset.as_ref(),
        }
    }

    pub fn derived_type(&self) -> DerivedType {
        self.derived_type
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.acquisition_state
    }

    /// Replaces the `kind` slot; the other slot is never touched
    pub fn set_asset(&mut self, kind: AssetKind, asset: AssetRef) {
        match kind {
            AssetKind::Audio => self.audio_asset = Some(asset),
            AssetKind::Text => self.text_asset = Some(asset),
        }
        self.refresh();
    }

    /// Puts the `kind` slot back to an earlier value; `None` empties it
    pub fn restore_asset(&mut self, kind: AssetKind, asset: Option<AssetRef>) {
        match kind {
            AssetKind::Audio => self.audio_asset = asset,
            AssetKind::Text => self.text_asset = asset,
        }
        self.refresh();
    }

    /// Merges every asset present in `update`
    pub fn merge_assets(&mut self, update: AssetUpdate) {
        if let Some(audio) = update.audio {
            self.audio_asset = Some(audio);
        }
        if let Some(text) = update.text {
            self.text_asset = Some(text);
        }
        self.refresh();
    }

    /// Changes the state of an existing asset
    ///
    /// Returns false if the book has no asset of that kind.
    pub fn set_asset_state(&mut self, kind: AssetKind, state: AssetState) -> bool {
        let slot = match kind {
            AssetKind::Audio => self.audio_asset.as_mut(),
            AssetKind::Text => self.text_asset.as_mut(),
        };
        let Some(asset) = slot else {
            return false;
        };
        asset.state = state;
        self.refresh();
        true
    }

    /// Recomputes `derived_type` and `acquisition_state` from the assets
    ///
    /// Called by every mutator; also used to normalise records read from
    /// storage.
    pub fn refresh(&mut self) {
        self.derived_type =
            DerivedType::from_presence(self.audio_asset.is_some(), self.text_asset.is_some());
        self.acquisition_state = self.compute_acquisition();
    }

    fn compute_acquisition(&self) -> AcquisitionState {
        let mut states = Vec::with_capacity(2);
        for kind in self.derived_type.required_kinds() {
            match self.asset(*kind) {
                Some(asset) => states.push(asset.state),
                None => return AcquisitionState::NotAcquired,
            }
        }

        if states.contains(&AssetState::Failed) {
            AcquisitionState::Error
        } else if states.iter().all(|s| *s == AssetState::Ready) {
            AcquisitionState::Ready
        } else if states.contains(&AssetState::Acquiring) {
            AcquisitionState::Acquiring
        } else {
            AcquisitionState::NotAcquired
        }
    }

    /// Records the resume position, clamped to the known duration
    pub fn set_position(&mut self, seconds: f64) {
        let mut position = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if self.duration_seconds > 0.0 {
            position = position.min(self.duration_seconds);
        }
        self.last_position_seconds = position;
    }

    /// Listening progress in `[0, 1]`; zero while the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.last_position_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Bookmarks, audio before text, each group ordered by position
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// Inserts a bookmark keeping the ordering
    pub fn add_bookmark(&mut self, bookmark: Bookmark) {
        let key = sort_key(&bookmark);
        let index = self.bookmarks.partition_point(|b| sort_key(b) <= key);
        self.bookmarks.insert(index, bookmark);
    }

    /// Removes a bookmark by id
    pub fn remove_bookmark(&mut self, id: BookmarkId) -> Option<Bookmark> {
        let index = self.bookmarks.iter().position(|b| b.id == id)?;
        Some(self.bookmarks.remove(index))
    }
}

fn sort_key(bookmark: &Bookmark) -> (u8, f64) {
    let group = match bookmark.kind {
        BookmarkKind::Audio => 0,
        BookmarkKind::Text => 1,
    };
    (group, bookmark.position)
}

impl Validator for Book {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.id.as_str().trim().is_empty() {
            errors.push("Book id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }

        if self.audio_asset.is_none() && self.text_asset.is_none() {
            errors.push("Book must have an audio or text asset".to_string());
        }

        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            errors.push("Duration must be a non-negative number".to_string());
        }

        if !self.last_position_seconds.is_finite() || self.last_position_seconds < 0.0 {
            errors.push("Last position must be a non-negative number".to_string());
        }

        for bookmark in &self.bookmarks {
            if let Err(mut e) = bookmark.validate() {
                errors.append(&mut e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
