//! Media Engine - playback control for Narrivo
//!
//! Audio decoding lives in a platform [`MediaBackend`]; this crate owns the
//! state machine on top of it ([`PlaybackController`]) and the read-along
//! mapping from audio position to chapter text ([`SyncCursor`]).

mod backend;
mod controller;
mod error;
pub mod read_along;
mod session;

pub use backend::{LoadRequest, LoadRequestId, MediaBackend, MediaEvent, MediaHandle, MediaSender};
pub use controller::PlaybackController;
pub use error::{EngineError, EngineResult};
pub use read_along::{ChapterUnits, SyncCursor, SyncState};
pub use session::{PlaybackEvent, PlaybackSession, PlayerState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::NoAudioAsset("b1".to_string());
        assert!(format!("{}", error).contains("b1"));
    }

    #[test]
    fn test_idle_state_name() {
        assert_eq!(PlayerState::Idle.to_string(), "IDLE");
    }
}
