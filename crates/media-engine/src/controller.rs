//! Playback controller: one media session driven through a state machine
//!
//! ```text
//! IDLE -> LOADING -> READY <-> PLAYING <-> PAUSED -> ENDED
//!              any non-IDLE state -> ERROR -> LOADING (next load_track)
//! ```
//!
//! The controller owns at most one backend handle. Loading a new track
//! releases the current one first, and a load that completes after a newer
//! `load_track` was issued is unloaded on arrival without ever becoming
//! visible. Every transition pushes the complete session to observers.

use crate::backend::{LoadRequest, LoadRequestId, MediaBackend, MediaEvent, MediaHandle};
use crate::error::{EngineError, EngineResult};
use crate::session::{PlaybackEvent, PlaybackSession, PlayerState};
use log::{debug, info, warn};
use narrivo_config::PlayerConfig;
use narrivo_core::{Book, BookId, Observers, PlaybackError, PlaybackRate, SubscriptionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct PlaybackController {
    backend: Arc<dyn MediaBackend>,
    config: PlayerConfig,
    session: Option<PlaybackSession>,
    handle: Option<MediaHandle>,
    pending_load: Option<LoadRequestId>,
    next_request: u64,
    /// Resume position waiting for a known duration
    pending_resume: Option<f64>,
    /// `play()` received while loading
    play_intent: bool,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
    events_rx: mpsc::UnboundedReceiver<MediaEvent>,
    observers: Observers<PlaybackEvent>,
}

impl PlaybackController {
    pub fn new(backend: Arc<dyn MediaBackend>, config: PlayerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            config,
            session: None,
            handle: None,
            pending_load: None,
            next_request: 0,
            pending_resume: None,
            play_intent: false,
            events_tx,
            events_rx,
            observers: Observers::new(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn state(&self) -> PlayerState {
        self.session
            .as_ref()
            .map_or(PlayerState::Idle, |session| session.state)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn book_id(&self) -> Option<&BookId> {
        self.session.as_ref().map(|session| &session.book_id)
    }

    /// Rate of the current session, or the configured default
    pub fn rate(&self) -> f32 {
        self.session
            .as_ref()
            .map_or(self.config.default_rate, |session| session.rate)
    }

    /// Loads the audio asset of `book` at the configured default rate
    pub fn load_track(&mut self, book: &Book) -> EngineResult<LoadRequestId> {
        self.load_track_with_rate(book, self.config.default_rate)
    }

    /// Loads the audio asset of `book` at `rate`
    ///
    /// Any current session is unloaded before the new resource is
    /// requested. A saved position is restored once the duration is known.
    pub fn load_track_with_rate(&mut self, book: &Book, rate: f32) -> EngineResult<LoadRequestId> {
        let asset = book
            .audio_asset()
            .ok_or_else(|| EngineError::NoAudioAsset(book.id.to_string()))?;

        self.release();

        self.next_request += 1;
        let request = LoadRequestId(self.next_request);
        let resume = book.last_position_seconds;

        self.pending_load = Some(request);
        self.pending_resume = (resume.is_finite() && resume > 0.0).then_some(resume);
        self.play_intent = false;
        self.session = Some(PlaybackSession::loading(
            book.id.clone(),
            self.pending_resume.unwrap_or(0.0),
            self.clamp_rate(rate),
        ));
        info!("Loading {} ({}) as {}", book.id, asset.uri, request);
        self.publish();

        let load = LoadRequest {
            id: request,
            uri: asset.uri.clone(),
            update_interval: Duration::from_millis(self.config.position_update_ms),
        };
        if let Err(error) = self.backend.load(load, self.events_tx.clone()) {
            self.pending_load = None;
            self.fail(error);
        }
        Ok(request)
    }

    /// Releases the media resource and drops the session
    pub fn unload(&mut self) {
        self.release();
    }

    /// Starts or resumes playback
    ///
    /// While loading, the request is remembered and applied once ready.
    /// Outside READY/PLAYING/PAUSED this does nothing.
    pub fn play(&mut self) {
        match self.state() {
            PlayerState::Loading => {
                debug!("Deferring play until loaded");
                self.play_intent = true;
            }
            PlayerState::Ready | PlayerState::Paused => {
                let Some(handle) = self.handle else {
                    return;
                };
                match self.backend.play(handle) {
                    Ok(()) => self.transition(PlayerState::Playing, |s| s.is_playing = true),
                    Err(error) => self.fail(error),
                }
            }
            _ => {}
        }
    }

    /// Pauses playback; cancels a deferred play while loading
    pub fn pause(&mut self) {
        match self.state() {
            PlayerState::Loading => self.play_intent = false,
            PlayerState::Playing => {
                let Some(handle) = self.handle else {
                    return;
                };
                match self.backend.pause(handle) {
                    Ok(()) => self.transition(PlayerState::Paused, |s| s.is_playing = false),
                    Err(error) => self.fail(error),
                }
            }
            _ => {}
        }
    }

    /// Seeks to `seconds`, clamped to `[0, duration]`
    ///
    /// Returns false without doing anything until the duration is known or
    /// outside READY/PLAYING/PAUSED.
    pub fn seek_to(&mut self, seconds: f64) -> bool {
        let (Some(handle), Some(session)) = (self.handle, self.session.as_ref()) else {
            return false;
        };
        if !session.state.is_controllable() || !session.has_duration() || !seconds.is_finite() {
            return false;
        }

        let target = seconds.clamp(0.0, session.duration_seconds);
        match self.backend.seek(handle, target) {
            Ok(()) => {
                self.pending_resume = None;
                if let Some(session) = self.session.as_mut() {
                    session.position_seconds = target;
                }
                self.publish();
                true
            }
            Err(error) => {
                self.fail(error);
                false
            }
        }
    }

    /// Moves by `delta` seconds, clamped to the track
    pub fn skip(&mut self, delta: f64) -> bool {
        let Some(position) = self.session.as_ref().map(|s| s.position_seconds) else {
            return false;
        };
        self.seek_to(position + delta)
    }

    pub fn skip_back(&mut self) -> bool {
        self.skip(-self.config.skip_back_secs)
    }

    pub fn skip_forward(&mut self) -> bool {
        self.skip(self.config.skip_forward_secs)
    }

    /// Sets the rate, clamped to the configured range; returns the rate applied
    ///
    /// The rate survives seeks; a new track starts at the default rate
    /// unless loaded with `load_track_with_rate`.
    pub fn set_rate(&mut self, rate: f32) -> f32 {
        let rate = self.clamp_rate(rate);
        let Some(session) = self.session.as_mut() else {
            return rate;
        };
        session.rate = rate;

        if let Some(handle) = self.handle {
            if let Err(error) = self.backend.set_rate(handle, rate) {
                self.fail(error);
                return rate;
            }
        }
        self.publish();
        rate
    }

    /// Waits for the next backend event
    pub async fn next_event(&mut self) -> Option<MediaEvent> {
        self.events_rx.recv().await
    }

    /// Applies queued events, waiting only while a load is outstanding
    pub async fn run_until_idle(&mut self) {
        loop {
            let event = if self.pending_load.is_some() {
                self.events_rx.recv().await
            } else {
                self.events_rx.try_recv().ok()
            };
            match event {
                Some(event) => {
                    self.handle_event(event);
                }
                None => break,
            }
        }
    }

    /// Applies one backend event; returns false if it was stale and dropped
    pub fn handle_event(&mut self, event: MediaEvent) -> bool {
        match event {
            MediaEvent::Loaded {
                request,
                handle,
                duration_seconds,
            } => self.on_loaded(request, handle, duration_seconds),
            MediaEvent::LoadFailed { request, error } => {
                if self.pending_load != Some(request) {
                    debug!("Ignoring failure of superseded {}", request);
                    return false;
                }
                self.pending_load = None;
                warn!("{} failed: {}", request, error);
                self.fail(error);
                true
            }
            MediaEvent::Status {
                handle,
                position_seconds,
                duration_seconds,
            } => {
                if self.handle != Some(handle) {
                    return false;
                }
                self.on_status(position_seconds, duration_seconds);
                true
            }
            MediaEvent::Finished { handle } => {
                if self.handle != Some(handle) || self.state() == PlayerState::Error {
                    return false;
                }
                info!("Track finished");
                self.transition(PlayerState::Ended, |s| {
                    s.is_playing = false;
                    if s.has_duration() {
                        s.position_seconds = s.duration_seconds;
                    }
                });
                true
            }
            MediaEvent::Error { handle, error } => {
                if self.handle != Some(handle) {
                    return false;
                }
                warn!("Media backend error: {}", error);
                self.fail(error);
                true
            }
        }
    }

    fn on_loaded(&mut self, request: LoadRequestId, handle: MediaHandle, duration: f64) -> bool {
        if self.pending_load != Some(request) {
            debug!("Unloading superseded {}", request);
            self.backend.unload(handle);
            return false;
        }

        self.pending_load = None;
        self.handle = Some(handle);

        let rate = self.rate();
        if let Err(error) = self.backend.set_rate(handle, rate) {
            self.fail(error);
            return true;
        }

        if let Some(session) = self.session.as_mut() {
            if duration.is_finite() && duration > 0.0 {
                session.duration_seconds = duration;
            }
            if !session.has_duration() {
                debug!("{} loaded, waiting for a duration", session.book_id);
                return true;
            }
        }
        self.become_ready();
        true
    }

    /// Resume seek, READY, then the deferred play, in that order
    fn become_ready(&mut self) {
        self.apply_resume();
        if self.state() != PlayerState::Loading {
            return;
        }

        self.transition(PlayerState::Ready, |s| s.is_buffering = false);

        if std::mem::take(&mut self.play_intent) {
            self.play();
        }
    }

    fn on_status(&mut self, position: f64, duration: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut changed = false;
        if duration.is_finite() && duration > 0.0 && session.duration_seconds != duration {
            session.duration_seconds = duration;
            changed = true;
        }

        if session.state == PlayerState::Loading {
            // Positions reported before the resume seek are meaningless
            if session.has_duration() {
                self.become_ready();
            }
            return;
        }

        if session.state == PlayerState::Playing && position.is_finite() {
            let upper = if session.has_duration() {
                session.duration_seconds
            } else {
                f64::INFINITY
            };
            session.position_seconds = position.clamp(0.0, upper);
            changed = true;
        }

        if changed {
            self.publish();
        }
    }

    /// Seeks to the saved position once a duration is known
    fn apply_resume(&mut self) {
        let (Some(handle), Some(session)) = (self.handle, self.session.as_mut()) else {
            return;
        };
        let Some(resume) = self.pending_resume else {
            return;
        };
        if !session.has_duration() {
            return;
        }

        let target = resume.min(session.duration_seconds);
        match self.backend.seek(handle, target) {
            Ok(()) => {
                debug!("Resumed {} at {:.1}s", session.book_id, target);
                session.position_seconds = target;
                self.pending_resume = None;
                self.publish();
            }
            Err(error) => {
                self.pending_resume = None;
                self.fail(error);
            }
        }
    }

    fn clamp_rate(&self, rate: f32) -> f32 {
        PlaybackRate::clamped(rate, self.config.min_rate, self.config.max_rate).value()
    }

    fn transition<F>(&mut self, state: PlayerState, update: F)
    where
        F: FnOnce(&mut PlaybackSession),
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        debug!("{}: {} -> {}", session.book_id, session.state, state);
        session.state = state;
        update(session);
        self.publish();
    }

    fn fail(&mut self, error: PlaybackError) {
        self.play_intent = false;
        self.transition(PlayerState::Error, |s| {
            s.is_playing = false;
            s.is_buffering = false;
            s.last_error = Some(error);
        });
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.unload(handle);
        }
        self.pending_load = None;
        self.pending_resume = None;
        self.play_intent = false;

        if let Some(session) = self.session.take() {
            debug!("Unloaded {}", session.book_id);
            self.observers.notify(&PlaybackEvent::Unloaded {
                book_id: session.book_id,
            });
        }
    }

    fn publish(&self) {
        if let Some(session) = &self.session {
            self.observers
                .notify(&PlaybackEvent::Session(session.clone()));
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.unload(handle);
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state())
            .field("handle", &self.handle)
            .field("pending_load", &self.pending_load)
            .finish()
    }
}
