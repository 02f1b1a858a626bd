//! Playback session snapshots pushed to observers

use narrivo_core::{format_clock, BookId, PlaybackError};
use std::fmt;

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlayerState {
    /// States in which play, pause and seek act
    pub fn is_controllable(&self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "IDLE",
            PlayerState::Loading => "LOADING",
            PlayerState::Ready => "READY",
            PlayerState::Playing => "PLAYING",
            PlayerState::Paused => "PAUSED",
            PlayerState::Ended => "ENDED",
            PlayerState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Full state of the loaded track
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub book_id: BookId,
    pub state: PlayerState,
    pub position_seconds: f64,
    /// 0 until the backend reports a duration
    pub duration_seconds: f64,
    pub rate: f32,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub last_error: Option<PlaybackError>,
}

impl PlaybackSession {
    pub(crate) fn loading(book_id: BookId, position_seconds: f64, rate: f32) -> Self {
        Self {
            book_id,
            state: PlayerState::Loading,
            position_seconds,
            duration_seconds: 0.0,
            rate,
            is_playing: false,
            is_buffering: true,
            last_error: None,
        }
    }

    /// True once the backend has reported a usable duration
    pub fn has_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }
}

impl fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} / {} @ {:.2}x",
            self.book_id,
            self.state,
            format_clock(self.position_seconds),
            format_clock(self.duration_seconds),
            self.rate
        )
    }
}

/// Notification sent to playback observers
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The complete current session
    Session(PlaybackSession),
    /// The session for `book_id` no longer exists
    Unloaded { book_id: BookId },
}

impl PlaybackEvent {
    pub fn session(&self) -> Option<&PlaybackSession> {
        match self {
            PlaybackEvent::Session(session) => Some(session),
            PlaybackEvent::Unloaded { .. } => None,
        }
    }
}
