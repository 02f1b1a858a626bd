//! Playback rate model

use crate::types::Validator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest supported playback rate
pub const MIN_RATE: f32 = 0.5;
/// Highest supported playback rate
pub const MAX_RATE: f32 = 3.0;

/// Playback rate multiplier
///
/// Rates are clamped rather than rejected, so any user input maps onto a
/// playable rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackRate(f32);

impl PlaybackRate {
    /// Creates a rate clamped to `[MIN_RATE, MAX_RATE]`
    pub fn new(rate: f32) -> Self {
        Self::clamped(rate, MIN_RATE, MAX_RATE)
    }

    /// Creates a rate clamped to a caller-supplied range
    ///
    /// Non-finite input falls back to 1.0 before clamping.
    pub fn clamped(rate: f32, min: f32, max: f32) -> Self {
        let rate = if rate.is_finite() { rate } else { 1.0 };
        Self(rate.clamp(min, max))
    }

    /// Returns the multiplier
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for PlaybackRate {
    fn default() -> Self {
        Self(1.0)
    }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

impl Validator for PlaybackRate {
    fn validate(&self) -> Result<(), Vec<String>> {
        if (MIN_RATE..=MAX_RATE).contains(&self.0) {
            Ok(())
        } else {
            Err(vec![format!(
                "Rate must be between {} and {}",
                MIN_RATE, MAX_RATE
            )])
        }
    }
}
