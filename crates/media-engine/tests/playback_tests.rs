//! Playback controller behaviour against a scripted media backend

use narrivo_config::PlayerConfig;
use narrivo_core::{AssetKind, AssetRef, Book, BookId, BookSource, PlaybackError};
use narrivo_media_engine::{
    ChapterUnits, EngineError, LoadRequest, LoadRequestId, MediaBackend, MediaEvent, MediaHandle,
    MediaSender, PlaybackController, PlaybackEvent, PlayerState, SyncCursor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(LoadRequestId, String),
    Unload(MediaHandle),
    Play(MediaHandle),
    Pause(MediaHandle),
    Seek(MediaHandle, f64),
    SetRate(MediaHandle, f32),
}

#[derive(Default)]
struct FakeMedia {
    calls: Mutex<Vec<Call>>,
    senders: Mutex<HashMap<LoadRequestId, MediaSender>>,
    refuse_loads: AtomicBool,
}

impl FakeMedia {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Seek(_, seconds) => Some(seconds),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| wanted(call)).count()
    }

    /// Sends an event through the channel handed over for `request`
    fn emit(&self, request: LoadRequestId, event: MediaEvent) {
        let senders = self.senders.lock().unwrap();
        senders[&request].send(event).unwrap();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaBackend for FakeMedia {
    fn load(&self, request: LoadRequest, events: MediaSender) -> Result<(), PlaybackError> {
        if self.refuse_loads.load(Ordering::SeqCst) {
            return Err(PlaybackError::LoadFailed {
                uri: request.uri,
                message: "unsupported codec".to_string(),
            });
        }
        self.record(Call::Load(request.id, request.uri));
        self.senders.lock().unwrap().insert(request.id, events);
        Ok(())
    }

    fn unload(&self, handle: MediaHandle) {
        self.record(Call::Unload(handle));
    }

    fn play(&self, handle: MediaHandle) -> Result<(), PlaybackError> {
        self.record(Call::Play(handle));
        Ok(())
    }

    fn pause(&self, handle: MediaHandle) -> Result<(), PlaybackError> {
        self.record(Call::Pause(handle));
        Ok(())
    }

    fn seek(&self, handle: MediaHandle, seconds: f64) -> Result<(), PlaybackError> {
        self.record(Call::Seek(handle, seconds));
        Ok(())
    }

    fn set_rate(&self, handle: MediaHandle, rate: f32) -> Result<(), PlaybackError> {
        self.record(Call::SetRate(handle, rate));
        Ok(())
    }
}

fn audiobook(id: &str) -> Book {
    Book::new(BookId::new(id), format!("Title {}", id), "Author", BookSource::User)
        .with_asset(AssetKind::Audio, AssetRef::local(format!("file:///books/{}.mp3", id)))
}

fn setup() -> (Arc<FakeMedia>, PlaybackController, Arc<Mutex<Vec<PlaybackEvent>>>) {
    let fake = Arc::new(FakeMedia::default());
    let mut controller = PlaybackController::new(fake.clone(), PlayerConfig::default());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    controller.subscribe(move |event: &PlaybackEvent| sink.lock().unwrap().push(event.clone()));

    (fake, controller, seen)
}

fn loaded(request: LoadRequestId, handle: u64, duration: f64) -> MediaEvent {
    MediaEvent::Loaded {
        request,
        handle: MediaHandle(handle),
        duration_seconds: duration,
    }
}

fn status(handle: u64, position: f64, duration: f64) -> MediaEvent {
    MediaEvent::Status {
        handle: MediaHandle(handle),
        position_seconds: position,
        duration_seconds: duration,
    }
}

/// Loads `book` and completes the load with `duration`
fn ready(controller: &mut PlaybackController, book: &Book, handle: u64, duration: f64) {
    let request = controller.load_track(book).unwrap();
    assert!(controller.handle_event(loaded(request, handle, duration)));
    assert_eq!(controller.state(), PlayerState::Ready);
}

#[test]
fn test_load_reaches_ready_once_metadata_arrives() {
    let (fake, mut controller, seen) = setup();
    let book = audiobook("a");

    assert_eq!(controller.state(), PlayerState::Idle);
    let request = controller.load_track(&book).unwrap();

    assert_eq!(controller.state(), PlayerState::Loading);
    assert_eq!(
        fake.calls(),
        vec![Call::Load(request, "file:///books/a.mp3".to_string())]
    );

    controller.handle_event(loaded(request, 7, 100.0));

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Ready);
    assert_eq!(session.duration_seconds, 100.0);
    assert!(!session.is_buffering);
    assert!(fake.calls().contains(&Call::SetRate(MediaHandle(7), 1.0)));

    let states: Vec<PlayerState> = seen
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| event.session().map(|s| s.state))
        .collect();
    assert_eq!(states, vec![PlayerState::Loading, PlayerState::Ready]);
}

#[test]
fn test_book_without_audio_is_rejected() {
    let (fake, mut controller, _seen) = setup();
    let ebook = Book::new(BookId::new("e"), "Text Only", "Author", BookSource::User)
        .with_asset(AssetKind::Text, AssetRef::local("file:///books/e.epub"));

    let result = controller.load_track(&ebook);

    assert!(matches!(result, Err(EngineError::NoAudioAsset(id)) if id == "e"));
    assert_eq!(controller.state(), PlayerState::Idle);
    assert!(fake.calls().is_empty());
}

#[test]
fn test_resume_position_applied_after_duration_known() {
    let (fake, mut controller, seen) = setup();
    let mut book = audiobook("x").with_duration(1200.0);
    book.set_position(300.0);

    let request = controller.load_track(&book).unwrap();
    assert!(fake.seeks().is_empty());

    controller.handle_event(loaded(request, 1, 1200.0));

    assert_eq!(fake.seeks(), vec![300.0]);
    assert_eq!(controller.session().unwrap().position_seconds, 300.0);

    let events = seen.lock().unwrap();
    let ready = events
        .iter()
        .filter_map(PlaybackEvent::session)
        .find(|s| s.state == PlayerState::Ready)
        .unwrap();
    assert_eq!(ready.position_seconds, 300.0);
    assert!(events
        .iter()
        .filter_map(PlaybackEvent::session)
        .all(|s| s.position_seconds == 300.0));
}

#[test]
fn test_resume_waits_for_late_duration() {
    let (fake, mut controller, _seen) = setup();
    let mut book = audiobook("x");
    book.set_position(300.0);

    let request = controller.load_track(&book).unwrap();
    controller.play();
    controller.handle_event(loaded(request, 1, 0.0));

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Loading);
    assert!(session.is_buffering);
    assert!(fake.seeks().is_empty());
    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 0);
    assert!(!controller.seek_to(10.0));

    // The first report still carries the pre-seek position
    controller.handle_event(status(1, 0.0, 1200.0));

    assert_eq!(fake.seeks(), vec![300.0]);
    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Playing);
    assert!(!session.is_buffering);
    assert_eq!(session.position_seconds, 300.0);
    assert_eq!(session.duration_seconds, 1200.0);

    let calls = fake.calls();
    let seek = calls
        .iter()
        .position(|c| matches!(c, Call::Seek(_, _)))
        .unwrap();
    let play = calls
        .iter()
        .position(|c| matches!(c, Call::Play(_)))
        .unwrap();
    assert!(seek < play);
}

#[test]
fn test_status_position_never_exceeds_duration() {
    let (_fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);
    controller.play();

    controller.handle_event(status(1, 150.0, 100.0));
    assert_eq!(controller.session().unwrap().position_seconds, 100.0);

    controller.handle_event(status(1, -4.0, 100.0));
    assert_eq!(controller.session().unwrap().position_seconds, 0.0);
}

#[test]
fn test_stale_load_never_becomes_visible() {
    let (fake, mut controller, seen) = setup();
    let a = audiobook("a");
    let b = audiobook("b");

    let first = controller.load_track(&a).unwrap();
    let second = controller.load_track(&b).unwrap();
    let issued_at = seen.lock().unwrap().len();

    // A finishes loading after B was requested
    assert!(!controller.handle_event(loaded(first, 10, 60.0)));
    assert!(fake.calls().contains(&Call::Unload(MediaHandle(10))));
    assert_eq!(controller.book_id(), Some(&BookId::new("b")));

    assert!(!controller.handle_event(status(10, 5.0, 60.0)));
    assert!(!controller.handle_event(MediaEvent::Finished {
        handle: MediaHandle(10)
    }));

    controller.handle_event(loaded(second, 11, 90.0));
    controller.play();
    controller.handle_event(status(11, 1.0, 90.0));

    let events = seen.lock().unwrap();
    assert!(events[issued_at..]
        .iter()
        .filter_map(PlaybackEvent::session)
        .all(|s| s.book_id == BookId::new("b")));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Unloaded { book_id } if book_id.as_str() == "a")));
    assert_eq!(fake.count(|c| matches!(c, Call::Play(MediaHandle(10)))), 0);
}

#[test]
fn test_switching_tracks_releases_previous_handle_first() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 60.0);

    let request = controller.load_track(&audiobook("b")).unwrap();

    let calls = fake.calls();
    let unload = calls
        .iter()
        .position(|c| *c == Call::Unload(MediaHandle(1)))
        .unwrap();
    let load = calls
        .iter()
        .position(|c| matches!(c, Call::Load(id, _) if *id == request))
        .unwrap();
    assert!(unload < load);
}

#[test]
fn test_play_while_loading_is_deferred() {
    let (fake, mut controller, _seen) = setup();
    let request = controller.load_track(&audiobook("a")).unwrap();

    controller.play();
    assert_eq!(controller.state(), PlayerState::Loading);
    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 0);

    controller.handle_event(loaded(request, 3, 60.0));

    assert_eq!(controller.state(), PlayerState::Playing);
    assert!(controller.session().unwrap().is_playing);
    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 1);
}

#[test]
fn test_pause_cancels_deferred_play() {
    let (fake, mut controller, _seen) = setup();
    let request = controller.load_track(&audiobook("a")).unwrap();

    controller.play();
    controller.pause();
    controller.handle_event(loaded(request, 3, 60.0));

    assert_eq!(controller.state(), PlayerState::Ready);
    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 0);
}

#[test]
fn test_controls_are_noops_when_idle() {
    let (fake, mut controller, seen) = setup();

    controller.play();
    controller.pause();
    assert!(!controller.seek_to(10.0));
    assert!(!controller.skip_forward());
    controller.set_rate(2.0);

    assert_eq!(controller.state(), PlayerState::Idle);
    assert!(fake.calls().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_play_pause_cycle() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 5, 60.0);

    controller.play();
    assert_eq!(controller.state(), PlayerState::Playing);
    controller.pause();
    assert_eq!(controller.state(), PlayerState::Paused);
    assert!(!controller.session().unwrap().is_playing);
    controller.play();
    assert_eq!(controller.state(), PlayerState::Playing);

    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 2);
    assert_eq!(fake.count(|c| matches!(c, Call::Pause(_))), 1);
}

#[test]
fn test_seek_clamps_and_keeps_playing_flag() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);
    controller.play();

    assert!(controller.seek_to(150.0));
    assert_eq!(controller.session().unwrap().position_seconds, 100.0);
    assert!(controller.seek_to(-5.0));
    assert_eq!(controller.session().unwrap().position_seconds, 0.0);

    assert_eq!(fake.seeks(), vec![100.0, 0.0]);
    assert!(controller.session().unwrap().is_playing);
    assert_eq!(controller.state(), PlayerState::Playing);
}

#[test]
fn test_skip_uses_configured_intervals() {
    let (_fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);

    controller.seek_to(50.0);
    assert!(controller.skip_forward());
    assert_eq!(controller.session().unwrap().position_seconds, 80.0);
    assert!(controller.skip_back());
    assert_eq!(controller.session().unwrap().position_seconds, 65.0);
    assert!(controller.skip(90.0));
    assert_eq!(controller.session().unwrap().position_seconds, 100.0);
}

#[test]
fn test_rate_is_clamped_and_reset_per_track() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);

    assert_eq!(controller.set_rate(5.0), 3.0);
    assert_eq!(controller.set_rate(0.1), 0.5);
    assert_eq!(controller.set_rate(1.5), 1.5);
    assert!(fake.calls().contains(&Call::SetRate(MediaHandle(1), 1.5)));

    controller.seek_to(20.0);
    assert_eq!(controller.rate(), 1.5);

    ready(&mut controller, &audiobook("b"), 2, 100.0);
    assert_eq!(controller.rate(), 1.0);

    let request = controller
        .load_track_with_rate(&audiobook("c"), 2.0)
        .unwrap();
    controller.handle_event(loaded(request, 3, 100.0));
    assert_eq!(controller.rate(), 2.0);
    assert!(fake.calls().contains(&Call::SetRate(MediaHandle(3), 2.0)));
}

#[test]
fn test_positions_only_tracked_while_playing() {
    let (_fake, mut controller, seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);

    controller.handle_event(status(1, 12.0, 100.0));
    assert_eq!(controller.session().unwrap().position_seconds, 0.0);

    controller.play();
    let before = seen.lock().unwrap().len();
    controller.handle_event(status(1, 12.0, 100.0));
    controller.handle_event(status(1, 13.0, 100.0));

    assert_eq!(controller.session().unwrap().position_seconds, 13.0);
    let events = seen.lock().unwrap();
    assert_eq!(events.len(), before + 2);
    assert_eq!(
        events.last().and_then(PlaybackEvent::session).map(|s| s.position_seconds),
        Some(13.0)
    );
}

#[test]
fn test_error_preserves_position() {
    let (_fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);
    controller.play();
    controller.handle_event(status(1, 42.0, 100.0));

    controller.handle_event(MediaEvent::Error {
        handle: MediaHandle(1),
        error: PlaybackError::Backend {
            message: "output device lost".to_string(),
        },
    });

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Error);
    assert_eq!(session.position_seconds, 42.0);
    assert!(!session.is_playing);
    assert!(session.last_error.is_some());

    controller.play();
    assert_eq!(controller.state(), PlayerState::Error);

    controller.load_track(&audiobook("a")).unwrap();
    assert_eq!(controller.state(), PlayerState::Loading);
    assert!(controller.session().unwrap().last_error.is_none());
}

#[test]
fn test_load_failures_enter_error_state() {
    let (fake, mut controller, _seen) = setup();

    let request = controller.load_track(&audiobook("a")).unwrap();
    controller.handle_event(MediaEvent::LoadFailed {
        request,
        error: PlaybackError::LoadFailed {
            uri: "file:///books/a.mp3".to_string(),
            message: "not found".to_string(),
        },
    });
    assert_eq!(controller.state(), PlayerState::Error);

    fake.refuse_loads.store(true, Ordering::SeqCst);
    controller.load_track(&audiobook("b")).unwrap();

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Error);
    assert_eq!(session.book_id, BookId::new("b"));
    assert!(matches!(
        session.last_error,
        Some(PlaybackError::LoadFailed { .. })
    ));
}

#[test]
fn test_finished_track_ends_session() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);
    controller.play();
    controller.handle_event(status(1, 99.5, 100.0));

    assert!(controller.handle_event(MediaEvent::Finished {
        handle: MediaHandle(1)
    }));

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Ended);
    assert_eq!(session.position_seconds, 100.0);
    assert!(!session.is_playing);

    controller.play();
    assert!(!controller.seek_to(0.0));
    assert_eq!(controller.state(), PlayerState::Ended);
    assert_eq!(fake.count(|c| matches!(c, Call::Play(_))), 1);
}

#[test]
fn test_unload_releases_handle_and_notifies() {
    let (fake, mut controller, seen) = setup();
    ready(&mut controller, &audiobook("a"), 4, 100.0);

    controller.unload();

    assert_eq!(controller.state(), PlayerState::Idle);
    assert!(controller.session().is_none());
    assert!(fake.calls().contains(&Call::Unload(MediaHandle(4))));
    assert!(matches!(
        seen.lock().unwrap().last(),
        Some(PlaybackEvent::Unloaded { book_id }) if book_id.as_str() == "a"
    ));
}

#[test]
fn test_unsubscribed_observer_stops_receiving() {
    let (_fake, mut controller, _seen) = setup();
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let id = controller.subscribe(move |_: &PlaybackEvent| *counter.lock().unwrap() += 1);

    controller.load_track(&audiobook("a")).unwrap();
    assert!(controller.unsubscribe(id));
    controller.unload();

    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_events_flow_through_channel() {
    let (fake, mut controller, _seen) = setup();
    let mut book = audiobook("a");
    book.set_position(30.0);

    let request = controller.load_track(&book).unwrap();
    controller.play();

    fake.emit(request, loaded(request, 9, 120.0));
    fake.emit(request, status(9, 31.0, 120.0));
    controller.run_until_idle().await;

    let session = controller.session().unwrap();
    assert_eq!(session.state, PlayerState::Playing);
    assert_eq!(session.position_seconds, 31.0);
    assert_eq!(fake.seeks(), vec![30.0]);
}

#[tokio::test]
async fn test_next_event_returns_backend_callbacks() {
    let (fake, mut controller, _seen) = setup();
    let request = controller.load_track(&audiobook("a")).unwrap();

    fake.emit(request, loaded(request, 2, 10.0));
    let event = controller.next_event().await.unwrap();

    assert_eq!(event, loaded(request, 2, 10.0));
    assert!(controller.handle_event(event));
    assert_eq!(controller.state(), PlayerState::Ready);
}

#[test]
fn test_read_along_tap_seeks_controller() {
    let (fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);

    let units = ChapterUnits::from_units(["one", "two", "three", "four", "five"]);
    let cursor = SyncCursor::new(&units, 0);

    let state = cursor.seek(&mut controller, 3).unwrap();
    assert_eq!(state.unit_index, Some(3));
    assert_eq!(fake.seeks(), vec![60.0]);

    let session = controller.session().unwrap();
    assert_eq!(cursor.state_for(session).unit_index, Some(3));
    assert!(cursor.seek(&mut controller, 9).is_none());
}

#[test]
fn test_read_along_tap_highlights_tapped_unit_while_paused() {
    let (_fake, mut controller, _seen) = setup();
    ready(&mut controller, &audiobook("a"), 1, 100.0);

    let units = ChapterUnits::from_units(["one", "two", "three"]);
    let cursor = SyncCursor::new(&units, 0);

    for index in 0..3 {
        let state = cursor.seek(&mut controller, index).unwrap();
        assert_eq!(state.unit_index, Some(index));
        let session = controller.session().unwrap();
        assert_eq!(session.state, PlayerState::Ready);
        assert_eq!(cursor.state_for(session).unit_index, Some(index));
    }
}
