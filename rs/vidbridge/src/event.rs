//! Translates level-triggered engine notifications into discrete playback events.

use std::{
	pin::Pin,
	task::{Context, Poll},
	time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{EngineEvent, ErrorKind, MediaInfo, PlaybackState, Status};

/// The engine event category reporting buffering progress.
pub const BUFFERING_CATEGORY: &str = "reader.buffering";

/// A discrete playback event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// The media is loaded.
	///
	/// Live streams (and anything else without a known duration) report [Duration::MAX],
	/// so controllers don't consider them finished immediately.
	Initialized { duration: Duration, width: u32, height: u32 },

	BufferingStart,
	BufferingEnd,

	/// The buffered range, from the current position to the end of the buffer.
	BufferingUpdate { start: Duration, end: Duration },

	IsPlayingChanged(bool),

	/// Creation failed. Always the last event on the stream.
	Error { kind: ErrorKind, message: String },
}

impl Event {
	pub(crate) fn initialized(info: &MediaInfo) -> Self {
		let duration = match info.duration {
			Duration::ZERO => Duration::MAX,
			duration => duration,
		};

		let (width, height) = info
			.video
			.first()
			.map(|video| (video.width, video.height))
			.unwrap_or_default();

		Self::Initialized {
			duration,
			width,
			height,
		}
	}

	pub(crate) fn buffering_update(position: Duration, buffered: Duration) -> Self {
		Self::BufferingUpdate {
			start: position,
			end: position.saturating_add(buffered),
		}
	}
}

/// A boolean latch that only fires on the rising edge.
#[derive(Debug, Default, Clone, Copy)]
struct Edge {
	set: bool,
}

impl Edge {
	/// Update the latch, returning true if it went from clear to set.
	fn rise(&mut self, set: bool) -> bool {
		let rose = set && !self.set;
		self.set = set;
		rose
	}
}

/// The per-session edge detector.
///
/// Owned by exactly one task, so every notification is applied atomically and in order.
#[derive(Debug, Default)]
pub struct Translator {
	loaded: Edge,
	buffering: Edge,
	buffered: Edge,

	status: Status,
	state: PlaybackState,
}

impl Translator {
	pub fn new() -> Self {
		Self::default()
	}

	/// The most recent status snapshot.
	pub fn status(&self) -> Status {
		self.status
	}

	/// The most recent transport state.
	pub fn state(&self) -> PlaybackState {
		self.state
	}

	/// Apply a new status snapshot, returning an event per rising edge.
	///
	/// `info` is only queried when the media was just loaded.
	pub fn on_status<F: FnOnce() -> MediaInfo>(&mut self, status: Status, info: F) -> Vec<Event> {
		let mut events = Vec::new();

		if self.loaded.rise(status.contains(Status::LOADED)) {
			events.push(Event::initialized(&info()));
		}

		if self.buffering.rise(status.contains(Status::BUFFERING)) {
			events.push(Event::BufferingStart);
		}

		if self.buffered.rise(status.contains(Status::BUFFERED)) {
			events.push(Event::BufferingEnd);
		}

		self.status = status;
		events
	}

	/// Every reported state is forwarded, even if it didn't change.
	pub fn on_state(&mut self, state: PlaybackState) -> Event {
		self.state = state;
		Event::IsPlayingChanged(state == PlaybackState::Playing)
	}

	/// Only buffering progress produces an event; `range` is queried lazily.
	pub fn on_event<F: FnOnce() -> (Duration, Duration)>(&mut self, event: &EngineEvent, range: F) -> Option<Event> {
		if event.category != BUFFERING_CATEGORY {
			tracing::trace!(category = %event.category, detail = %event.detail, error = event.error, "ignoring engine event");
			return None;
		}

		let (position, buffered) = range();
		Some(Event::buffering_update(position, buffered))
	}
}

/// The producing side of a session's event stream.
///
/// Events are buffered until somebody subscribes, so nothing produced during creation is lost.
#[derive(Debug)]
pub(crate) struct EventSink {
	tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
	rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl EventSink {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			tx: Mutex::new(Some(tx)),
			rx: Mutex::new(Some(rx)),
		}
	}

	/// Returns false if the sink is closed.
	pub fn send(&self, event: Event) -> bool {
		match self.tx.lock().as_ref() {
			Some(tx) => tx.send(event).is_ok(),
			None => false,
		}
	}

	/// Replace anything not yet delivered with a single terminal event, then close.
	pub fn fail(&self, event: Event) {
		let mut tx = self.tx.lock();

		if let Some(rx) = self.rx.lock().as_mut() {
			while rx.try_recv().is_ok() {}
		}

		if let Some(tx) = tx.take() {
			let _ = tx.send(event);
		}
	}

	/// Take the stream, which can only be done once.
	pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
		self.rx.lock().take()
	}

	/// Stop accepting events; subscribers see the end of the stream once drained.
	pub fn close(&self) {
		self.tx.lock().take();
	}

	pub fn is_closed(&self) -> bool {
		self.tx.lock().is_none()
	}
}

/// A session's ordered event stream.
///
/// Dropping it only stops delivery; the session keeps playing until disposed.
/// A failed session is the exception: it's disposed once its error is read, or the stream dropped.
pub struct EventStream {
	rx: mpsc::UnboundedReceiver<Event>,

	// Run after an error, at the end of the stream, or on drop; whichever comes first.
	finished: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl EventStream {
	pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
		Self { rx, finished: None }
	}

	pub(crate) fn on_finished<F: FnOnce() + Send + Sync + 'static>(mut self, f: F) -> Self {
		self.finished = Some(Box::new(f));
		self
	}

	fn finish(&mut self) {
		if let Some(finished) = self.finished.take() {
			finished();
		}
	}

	/// Wait for the next event, returning [None] once the session is disposed.
	pub async fn next(&mut self) -> Option<Event> {
		futures::StreamExt::next(self).await
	}
}

impl futures::Stream for EventStream {
	type Item = Event;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let res = self.rx.poll_recv(cx);
		if let Poll::Ready(None | Some(Event::Error { .. })) = res {
			self.finish();
		}
		res
	}
}

impl Drop for EventStream {
	fn drop(&mut self) {
		self.finish();
	}
}

#[cfg(test)]
mod test {
	use std::sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	};

	use super::*;
	use crate::VideoStream;

	fn info(duration: Duration) -> MediaInfo {
		MediaInfo {
			duration,
			video: vec![VideoStream {
				width: 1920,
				height: 1080,
			}],
		}
	}

	#[test]
	fn loaded_rising_edges() {
		let mut translator = Translator::new();
		let snapshots = [
			Status::LOADING,
			Status::LOADED,
			Status::LOADED | Status::PREPARED,
			Status::LOADED,
			Status::UNLOADED,
			Status::LOADED,
		];

		let initialized = snapshots
			.into_iter()
			.flat_map(|status| translator.on_status(status, || info(Duration::from_secs(3))))
			.filter(|event| matches!(event, Event::Initialized { .. }))
			.count();

		// Two rising edges on the loaded bit.
		assert_eq!(initialized, 2);
	}

	#[test]
	fn never_loaded() {
		let mut translator = Translator::new();
		for status in [Status::LOADING, Status::INVALID, Status::empty()] {
			let events = translator.on_status(status, || panic!("queried media info"));
			assert!(events.is_empty());
		}
	}

	#[test]
	fn repeated_snapshot() {
		let mut translator = Translator::new();

		let buffering = Status::LOADED | Status::BUFFERING;
		let events = translator.on_status(buffering, || info(Duration::from_secs(1)));
		assert_eq!(events.len(), 2);
		assert_eq!(events[1], Event::BufferingStart);

		assert!(translator.on_status(buffering, || info(Duration::from_secs(1))).is_empty());

		let buffered = Status::LOADED | Status::BUFFERED;
		assert_eq!(translator.on_status(buffered, || unreachable!()), vec![Event::BufferingEnd]);
		assert!(translator.on_status(buffered, || unreachable!()).is_empty());
		assert_eq!(translator.status(), buffered);

		// Falling edges are silent, the next rise fires again.
		assert!(translator.on_status(Status::LOADED, || unreachable!()).is_empty());
		assert_eq!(
			translator.on_status(Status::LOADED | Status::BUFFERING, || unreachable!()),
			vec![Event::BufferingStart]
		);
	}

	#[test]
	fn edge_order() {
		let mut translator = Translator::new();
		let events = translator.on_status(Status::LOADED | Status::BUFFERING | Status::BUFFERED, || {
			info(Duration::from_millis(1500))
		});

		assert_eq!(
			events,
			vec![
				Event::Initialized {
					duration: Duration::from_millis(1500),
					width: 1920,
					height: 1080
				},
				Event::BufferingStart,
				Event::BufferingEnd,
			]
		);
	}

	#[test]
	fn live_duration() {
		let mut translator = Translator::new();
		let events = translator.on_status(Status::LOADED, MediaInfo::default);

		assert_eq!(
			events,
			vec![Event::Initialized {
				duration: Duration::MAX,
				width: 0,
				height: 0
			}]
		);
	}

	#[test]
	fn state_not_deduplicated() {
		let mut translator = Translator::new();
		assert_eq!(translator.on_state(PlaybackState::Playing), Event::IsPlayingChanged(true));
		assert_eq!(translator.on_state(PlaybackState::Playing), Event::IsPlayingChanged(true));
		assert_eq!(translator.on_state(PlaybackState::Paused), Event::IsPlayingChanged(false));
		assert_eq!(translator.state(), PlaybackState::Paused);
	}

	#[test]
	fn buffering_progress() {
		let mut translator = Translator::new();

		let progress = EngineEvent {
			category: BUFFERING_CATEGORY.to_string(),
			error: 40,
			..Default::default()
		};
		let event = translator.on_event(&progress, || (Duration::from_secs(2), Duration::from_secs(5)));
		assert_eq!(
			event,
			Some(Event::BufferingUpdate {
				start: Duration::from_secs(2),
				end: Duration::from_secs(7)
			})
		);

		let other = EngineEvent {
			category: "decoder.video".to_string(),
			..Default::default()
		};
		assert_eq!(translator.on_event(&other, || unreachable!()), None);
	}

	#[tokio::test]
	async fn sink_fail_replaces_pending() {
		let sink = EventSink::new();
		assert!(sink.send(Event::BufferingStart));

		sink.fail(Event::Error {
			kind: ErrorKind::VideoSize,
			message: "nope".to_string(),
		});
		assert!(sink.is_closed());
		assert!(!sink.send(Event::BufferingEnd));

		let mut stream = EventStream::new(sink.subscribe().unwrap());
		assert!(matches!(
			stream.next().await,
			Some(Event::Error {
				kind: ErrorKind::VideoSize,
				..
			})
		));
		assert_eq!(stream.next().await, None);
		assert!(sink.subscribe().is_none());
	}

	fn counted(rx: mpsc::UnboundedReceiver<Event>) -> (EventStream, Arc<AtomicUsize>) {
		let count = Arc::new(AtomicUsize::new(0));
		let finished = count.clone();
		let stream = EventStream::new(rx).on_finished(move || {
			finished.fetch_add(1, Ordering::SeqCst);
		});
		(stream, count)
	}

	#[tokio::test]
	async fn finished_after_error() {
		let sink = EventSink::new();
		sink.fail(Event::Error {
			kind: ErrorKind::MediaOpen,
			message: "gone".to_string(),
		});

		let (mut stream, count) = counted(sink.subscribe().unwrap());
		assert!(matches!(stream.next().await, Some(Event::Error { .. })));
		assert_eq!(count.load(Ordering::SeqCst), 1);

		// Only once, even after the end and a drop.
		assert_eq!(stream.next().await, None);
		drop(stream);
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn finished_on_drop() {
		let sink = EventSink::new();
		sink.send(Event::BufferingStart);

		let (mut stream, count) = counted(sink.subscribe().unwrap());
		assert_eq!(stream.next().await, Some(Event::BufferingStart));
		assert_eq!(count.load(Ordering::SeqCst), 0);

		drop(stream);
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}
}
