//! Platform media backend contract
//!
//! A backend only translates primitive calls and callbacks; it never holds
//! playback state of its own. Results of asynchronous work are reported as
//! [`MediaEvent`]s on the sender handed over in [`MediaBackend::load`].

use narrivo_core::PlaybackError;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Backend-assigned handle for one loaded media resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub u64);

/// Controller-assigned id of one `load_track` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadRequestId(pub u64);

impl fmt::Display for LoadRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load-{}", self.0)
    }
}

/// A request to open a media resource
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub id: LoadRequestId,
    pub uri: String,
    /// How often `Status` events should be sent while playing
    pub update_interval: Duration,
}

/// Callback from the media backend
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The resource is open; `duration_seconds` is 0 while still unknown
    Loaded {
        request: LoadRequestId,
        handle: MediaHandle,
        duration_seconds: f64,
    },
    LoadFailed {
        request: LoadRequestId,
        error: PlaybackError,
    },
    /// Periodic position report
    Status {
        handle: MediaHandle,
        position_seconds: f64,
        duration_seconds: f64,
    },
    Finished {
        handle: MediaHandle,
    },
    Error {
        handle: MediaHandle,
        error: PlaybackError,
    },
}

pub type MediaSender = mpsc::UnboundedSender<MediaEvent>;

/// Primitive operations of a platform player
pub trait MediaBackend: Send + Sync {
    /// Starts opening a resource; completion arrives as `Loaded` or `LoadFailed`
    fn load(&self, request: LoadRequest, events: MediaSender) -> Result<(), PlaybackError>;

    /// Releases a resource; no events are sent for it afterwards
    fn unload(&self, handle: MediaHandle);

    fn play(&self, handle: MediaHandle) -> Result<(), PlaybackError>;

    fn pause(&self, handle: MediaHandle) -> Result<(), PlaybackError>;

    fn seek(&self, handle: MediaHandle, seconds: f64) -> Result<(), PlaybackError>;

    fn set_rate(&self, handle: MediaHandle, rate: f32) -> Result<(), PlaybackError>;
}
