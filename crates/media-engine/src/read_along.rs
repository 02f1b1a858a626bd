//! Read-along mapping between audio position and chapter text units
//!
//! Units are not time-anchored: the mapping is proportional over the whole
//! track, `unit = floor(position / duration * unit_count)`. Within one
//! chapter a non-decreasing position therefore never moves the highlight
//! backwards. Accuracy depends on the text being spread evenly over the
//! audio; there is no alignment data to do better.

use crate::controller::PlaybackController;
use crate::session::PlaybackSession;

/// Ordered text units (paragraphs) of one chapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterUnits {
    units: Vec<String>,
}

impl ChapterUnits {
    /// Splits `text` into paragraphs separated by blank lines
    pub fn from_text(text: &str) -> Self {
        let mut units = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    units.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            units.push(current.join(" "));
        }

        Self { units }
    }

    pub fn from_units<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            units: units.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.units.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(String::as_str)
    }
}

/// Highlight position within a chapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncState {
    pub chapter_index: usize,
    /// `None` only for a chapter without units
    pub unit_index: Option<usize>,
    pub unit_count: usize,
    /// Fraction of the track played, 0.0 to 1.0
    pub progress: f64,
}

impl SyncState {
    /// State right after switching chapters: first unit highlighted
    pub fn for_chapter_change(chapter_index: usize, unit_count: usize, progress: f64) -> Self {
        Self {
            chapter_index,
            unit_index: (unit_count > 0).then_some(0),
            unit_count,
            progress,
        }
    }

    pub fn is_current(&self, index: usize) -> bool {
        self.unit_index == Some(index)
    }

    /// True for units before the highlighted one
    pub fn is_past(&self, index: usize) -> bool {
        self.unit_index.is_some_and(|current| index < current)
    }
}

/// Fraction of the track at `position`; 0 while the duration is unknown
pub fn progress(position: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 || !position.is_finite() {
        return 0.0;
    }
    (position / duration).clamp(0.0, 1.0)
}

/// Unit highlighted at `position`, always within `[0, unit_count - 1]`
pub fn unit_index(position: f64, duration: f64, unit_count: usize) -> Option<usize> {
    if unit_count == 0 {
        return None;
    }
    let index = (progress(position, duration) * unit_count as f64).floor() as usize;
    Some(index.min(unit_count - 1))
}

/// Stateless cursor over one chapter's units
#[derive(Debug, Clone, Copy)]
pub struct SyncCursor<'a> {
    units: &'a ChapterUnits,
    chapter_index: usize,
}

impl<'a> SyncCursor<'a> {
    pub fn new(units: &'a ChapterUnits, chapter_index: usize) -> Self {
        Self {
            units,
            chapter_index,
        }
    }

    pub fn units(&self) -> &'a ChapterUnits {
        self.units
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn state(&self, position: f64, duration: f64) -> SyncState {
        SyncState {
            chapter_index: self.chapter_index,
            unit_index: unit_index(position, duration, self.units.len()),
            unit_count: self.units.len(),
            progress: progress(position, duration),
        }
    }

    pub fn state_for(&self, session: &PlaybackSession) -> SyncState {
        self.state(session.position_seconds, session.duration_seconds)
    }

    pub fn chapter_progress(&self, position: f64, duration: f64) -> f64 {
        progress(position, duration)
    }

    /// Moves to another chapter, keeping the global audio position
    pub fn change_chapter(
        &mut self,
        units: &'a ChapterUnits,
        chapter_index: usize,
        position: f64,
        duration: f64,
    ) -> SyncState {
        self.units = units;
        self.chapter_index = chapter_index;
        SyncState::for_chapter_change(chapter_index, units.len(), progress(position, duration))
    }

    /// Audio position where unit `index` starts
    ///
    /// The result always maps back to `index` through [`unit_index`].
    pub fn seek_target(&self, index: usize, duration: f64) -> Option<f64> {
        let count = self.units.len();
        if index >= count || !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        let mut target = index as f64 / count as f64 * duration;
        // Rounding can land a few ulps short of the unit boundary
        while target < duration && unit_index(target, duration, count) < Some(index) {
            target = target.next_up();
        }
        Some(target)
    }

    /// Seeks the controller to unit `index` (tap-to-seek)
    ///
    /// Returns the resulting highlight, or `None` if the seek was not
    /// possible.
    pub fn seek(&self, controller: &mut PlaybackController, index: usize) -> Option<SyncState> {
        let duration = controller.session()?.duration_seconds;
        let target = self.seek_target(index, duration)?;

        if !controller.seek_to(target) {
            return None;
        }
        Some(SyncState {
            chapter_index: self.chapter_index,
            unit_index: Some(index),
            unit_count: self.units.len(),
            progress: progress(target, duration),
        })
    }
}
