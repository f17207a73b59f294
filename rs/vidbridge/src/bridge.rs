use std::{any::Any, sync::Arc, time::Duration};

use crate::{
	CreateError, Engine, ErrorKind, Event, EventStream, Global, Host, Key, MediaInfo, MediaKind, PlaybackState, Player,
	PlayerPlatform, Registry, SeekFlags, Session, Source, SurfaceId, source,
};

/// Seeks requested by the caller: absolute, snapped to a keyframe and never leaving the buffer.
pub const SEEK_FLAGS: SeekFlags = SeekFlags::FROM_START.union(SeekFlags::KEY_FRAME).union(SeekFlags::IN_CACHE);

/// The initial seek while opening: try the cache, otherwise start from the beginning.
pub const PREPARE_FLAGS: SeekFlags = SeekFlags::FROM_START.union(SeekFlags::IN_CACHE);

/// The loop count that repeats forever.
pub const LOOP_FOREVER: i32 = -1;

/// The buffer limit meaning "no limit".
pub const UNBOUNDED: Duration = Duration::MAX;

/// The engine property holding the protocol whitelist.
pub const PROTOCOL_WHITELIST_PROPERTY: &str = "avio.protocol_whitelist";

/// The engine property holding extra HTTP headers.
pub const HEADERS_PROPERTY: &str = "avio.headers";

/// The engine property holding the container format hint.
pub const FORMAT_PROPERTY: &str = "avformat.format";

/// Bridges one platform adapter to the engine.
///
/// Owns every session created through it. Operations on an unknown key do nothing, except
/// [Bridge::events] which fails with [crate::Error::NotFound].
pub struct Bridge<E: Engine> {
	engine: Arc<E>,
	global: Arc<Global>,
	options: crate::Options,
	host: Host,
	registry: Arc<Registry<E::Player>>,
}

impl<E: Engine> Bridge<E> {
	pub(crate) fn new(engine: Arc<E>, global: Arc<Global>, options: crate::Options, host: Host) -> Self {
		Self {
			engine,
			global,
			options,
			host,
			registry: Default::default(),
		}
	}

	pub fn options(&self) -> &crate::Options {
		&self.options
	}

	/// Configure the engine, if that hasn't happened yet for this process.
	pub fn ensure_initialized(&self) {
		self.global.ensure_initialized(&*self.engine, &self.options, &self.host);
	}

	/// Dispose every session, ex. after the host restarted.
	pub async fn init(&self) {
		for key in self.registry.keys() {
			self.dispose(key).await;
		}
	}

	/// Open the media and bind a render surface.
	///
	/// On failure the session stays registered under the returned [crate::FailureToken], with a
	/// single [Event::Error] on its stream.
	pub async fn create(&self, source: &Source) -> Result<SurfaceId, CreateError> {
		self.ensure_initialized();

		let session = Session::new(&*self.engine, self.registry.next_token());
		self.configure(&session, source);

		let uri = source.resolve(&self.host.assets);
		tracing::debug!(%uri, token = %session.token, "opening media");

		if let Err(code) = session.open(&uri, PREPARE_FLAGS).await {
			return Err(self.fail(session, ErrorKind::MediaOpen, code));
		}

		let raw = match session.bind(&self.options.surface()).await {
			Ok(raw) => raw,
			Err(code) => return Err(self.fail(session, ErrorKind::VideoSize, code)),
		};

		let Some(id) = SurfaceId::new(raw) else {
			return Err(self.fail(session, ErrorKind::VideoSize, raw));
		};

		tracing::info!(%id, %uri, "created session");
		self.registry.insert(Key::Surface(id), session);

		Ok(id)
	}

	// Everything applied before the media is opened.
	fn configure(&self, session: &Session<E::Player>, source: &Source) {
		let properties = [
			Some((PROTOCOL_WHITELIST_PROPERTY, source::PROTOCOL_WHITELIST.to_string())),
			source.header_property().map(|headers| (HEADERS_PROPERTY, headers)),
			source.format.clone().map(|format| (FORMAT_PROPERTY, format)),
		];

		for (key, value) in properties.into_iter().flatten() {
			self.set_initial_property(session, key, &value);
		}

		let low_latency = self.options.low_latency.unwrap_or_default();
		if low_latency > 0 {
			self.set_initial_property(session, "avformat.fflags", "+nobuffer");
			self.set_initial_property(session, "avformat.fpsprobesize", "0");
			self.set_initial_property(session, "avformat.analyzeduration", "100000");

			if let Some(player) = session.player() {
				match low_latency {
					1 => player.set_buffer_range(Duration::ZERO, UNBOUNDED, false),
					_ => player.set_buffer_range(Duration::ZERO, Duration::from_secs(1), true),
				}
			}
		}

		for (key, value) in self.options.player_properties() {
			self.set_initial_property(session, key, &value);
		}

		let decoders = self.global.decoders();
		if let Some(player) = session.player().filter(|_| !decoders.is_empty()) {
			player.set_decoders(MediaKind::Video, decoders);
		}
	}

	fn set_initial_property(&self, session: &Session<E::Player>, key: &str, value: &str) {
		if let Err(err) = session.set_property(key, value) {
			tracing::warn!(%err, key, "failed to set property");
		}
	}

	fn fail(&self, session: Arc<Session<E::Player>>, kind: ErrorKind, code: i64) -> CreateError {
		let err = session.fail(kind, code);
		tracing::warn!(%err, token = %err.token, "failed to create session");

		self.registry.insert(Key::Failed(err.token), session);
		err
	}

	/// Remove and close the session; unknown keys are ignored.
	///
	/// The native player is released once any in-flight operation has finished with it.
	pub async fn dispose(&self, key: impl Into<Key>) {
		let key = key.into();
		if let Some(session) = self.registry.remove(key) {
			tracing::debug!(%key, "disposing session");
			session.close();
		}
	}

	/// Subscribe to the session's events.
	///
	/// Events produced before subscribing are buffered. The stream can only be taken once.
	/// A failed session is disposed once its error was read.
	pub fn events(&self, key: impl Into<Key>) -> crate::Result<EventStream> {
		let key = key.into();
		let session = self.registry.get(key).ok_or(crate::Error::NotFound)?;
		let stream = session.subscribe().ok_or(crate::Error::AlreadySubscribed)?;

		if !matches!(key, Key::Failed(_)) {
			return Ok(stream);
		}

		let registry = Arc::downgrade(&self.registry);
		Ok(stream.on_finished(move || {
			if let Some(session) = registry.upgrade().and_then(|registry| registry.remove(key)) {
				tracing::debug!(%key, "disposing failed session");
				session.close();
			}
		}))
	}

	fn session(&self, key: impl Into<Key>) -> Option<Arc<Session<E::Player>>> {
		let key = key.into();
		let session = self.registry.get(key);
		if session.is_none() {
			tracing::debug!(%key, "ignoring unknown session");
		}
		session
	}

	// Run against the native player of a live session.
	fn with_player<R>(&self, key: impl Into<Key>, f: impl FnOnce(&E::Player) -> R) -> Option<R> {
		self.session(key)?.player().map(f)
	}

	pub async fn play(&self, key: impl Into<Key>) {
		self.with_player(key, |player| player.set_state(PlaybackState::Playing));
	}

	pub async fn pause(&self, key: impl Into<Key>) {
		self.with_player(key, |player| player.set_state(PlaybackState::Paused));
	}

	pub async fn set_looping(&self, key: impl Into<Key>, looping: bool) {
		self.with_player(key, |player| player.set_loop(if looping { LOOP_FOREVER } else { 0 }));
	}

	/// Forwarded as is; the engine validates the range.
	pub async fn set_volume(&self, key: impl Into<Key>, volume: f64) {
		self.with_player(key, |player| player.set_volume(volume));
	}

	/// Forwarded as is; the engine validates the range.
	pub async fn set_playback_speed(&self, key: impl Into<Key>, speed: f64) {
		self.with_player(key, |player| player.set_playback_rate(speed));
	}

	/// An absolute seek to a keyframe, restricted to the local buffer.
	pub async fn seek_to(&self, key: impl Into<Key>, position: Duration) {
		self.with_player(key, |player| player.seek(position, SEEK_FLAGS));
	}

	/// An absolute keyframe seek that may leave the buffer.
	pub async fn fast_seek_to(&self, key: impl Into<Key>, position: Duration) {
		self.with_player(key, |player| player.seek(position, SeekFlags::FROM_START | SeekFlags::KEY_FRAME));
	}

	/// The current position, without side effects.
	pub async fn position(&self, key: impl Into<Key>) -> Option<Duration> {
		self.with_player(key, |player| player.position())
	}

	/// Publish the current buffered range on the session's stream.
	pub async fn republish_buffering(&self, key: impl Into<Key>) {
		if let Some(session) = self.session(key) {
			let (position, buffered) = session.buffering();
			session.publish(Event::buffering_update(position, buffered));
		}
	}

	/// The current position, also publishing the buffered range like platform adapters expect.
	///
	/// Unknown keys report zero.
	pub async fn get_position(&self, key: impl Into<Key>) -> Duration {
		let Some(session) = self.session(key) else {
			return Duration::ZERO;
		};

		let (position, buffered) = session.buffering();
		session.publish(Event::buffering_update(position, buffered));
		position
	}

	/// Set an engine property on a live session.
	pub async fn set_property(&self, key: impl Into<Key>, name: &str, value: &str) {
		self.with_player(key, |player| player.set_property(name, value));
	}

	pub async fn set_active_tracks(&self, key: impl Into<Key>, kind: MediaKind, tracks: &[u32]) {
		self.with_player(key, |player| player.set_active_tracks(kind, tracks));
	}

	pub async fn set_buffer_range(&self, key: impl Into<Key>, min: Duration, max: Duration, drop: bool) {
		self.with_player(key, |player| player.set_buffer_range(min, max, drop));
	}

	pub async fn media_info(&self, key: impl Into<Key>) -> Option<MediaInfo> {
		self.with_player(key, |player| player.media_info())
	}

	/// The number of registered sessions, including failed ones.
	pub fn len(&self) -> usize {
		self.registry.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<E: Engine> PlayerPlatform for Bridge<E> {
	fn name(&self) -> &str {
		"vidbridge"
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[cfg(test)]
mod test {
	use futures::FutureExt;

	use super::*;
	use crate::{
		FailureToken, NO_PLAYER, Platform, Status, VideoStream,
		mock::{Call, MockEngine},
	};

	fn bridge(engine: &MockEngine, options: &str) -> Bridge<MockEngine> {
		let host = Host {
			platform: Platform::Linux,
			emulator: false,
			assets: "/assets".into(),
		};

		let options = crate::Options::from_json(options).unwrap();
		Bridge::new(Arc::new(engine.clone()), Default::default(), options, host)
	}

	#[tokio::test]
	async fn media_open_error() {
		let engine = MockEngine::default();
		engine.set_prepare(-5);
		let bridge = bridge(&engine, "{}");

		let err = bridge.create(&Source::network("https://x/missing.mp4")).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::MediaOpen);
		assert_eq!(err.code, -5);
		assert!(Key::from(err.token).to_raw() < 0);

		// Surface binding never happened.
		assert!(!engine.calls().iter().any(|call| matches!(call, Call::UpdateSurface(..))));

		// Late notifications don't sneak in front of the error.
		engine.listener(0).status(Status::LOADED | Status::BUFFERING);
		tokio::task::yield_now().await;

		let mut events = bridge.events(err.token).unwrap();
		match events.next().await {
			Some(Event::Error { kind, .. }) => assert_eq!(kind.as_str(), "media open error"),
			event => panic!("unexpected event: {event:?}"),
		}
		assert_eq!(events.next().await, None);

		// Reading the error disposed the session.
		assert!(bridge.is_empty());
		assert!(engine.released(0));
	}

	#[tokio::test]
	async fn failed_session_disposed_once_read() {
		let engine = MockEngine::default();
		engine.set_prepare(-5);
		let bridge = bridge(&engine, "{}");

		let err = bridge.create(&Source::network("https://x/missing.mp4")).await.unwrap_err();
		let mut events = bridge.events(err.token).unwrap();
		assert!(matches!(events.next().await, Some(Event::Error { .. })));

		// Gone as soon as the error was read, even though the stream lives on.
		assert!(bridge.is_empty());
		assert!(engine.released(0));
		drop(events);

		// Dropping the stream without reading disposes it too.
		let err = bridge.create(&Source::network("https://x/missing.mp4")).await.unwrap_err();
		assert_eq!(bridge.len(), 1);
		drop(bridge.events(err.token).unwrap());
		assert!(bridge.is_empty());
		assert!(engine.released(1));
	}

	#[tokio::test]
	async fn no_player() {
		let engine = MockEngine::default();
		engine.set_no_player();
		let bridge = bridge(&engine, r#"{ "lowLatency": 1, "player": { "cache": 1 } }"#);

		let err = bridge.create(&Source::network("https://x/a.mp4")).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::MediaOpen);
		assert_eq!(err.code, NO_PLAYER);

		// Only the failure token is registered, and nothing reached a player.
		assert!(!engine.calls().iter().any(|call| matches!(
			call,
			Call::CreatePlayer(_) | Call::Property(..) | Call::Media(..) | Call::BufferRange(..)
		)));
		assert!(matches!(bridge.events(SurfaceId::new(1).unwrap()), Err(crate::Error::NotFound)));

		let mut events = bridge.events(err.token).unwrap();
		match events.next().await {
			Some(Event::Error { kind, message }) => {
				assert_eq!(kind, ErrorKind::MediaOpen);
				assert!(message.contains("https://x/a.mp4"));
			}
			event => panic!("unexpected event: {event:?}"),
		}
		assert!(bridge.is_empty());
	}

	#[tokio::test]
	async fn video_size_error() {
		let engine = MockEngine::default();
		engine.set_surface(-1);
		let bridge = bridge(&engine, "{}");

		let err = bridge.create(&Source::network("https://x/a.mp4")).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::VideoSize);
		assert_eq!(bridge.len(), 1);

		let mut events = bridge.events(Key::Failed(err.token)).unwrap();
		assert!(matches!(
			events.next().await,
			Some(Event::Error {
				kind: ErrorKind::VideoSize,
				..
			})
		));
		assert_eq!(events.next().await, None);
	}

	#[tokio::test]
	async fn failure_tokens_are_distinct() {
		let engine = MockEngine::default();
		engine.set_prepare(-1);
		let bridge = bridge(&engine, "{}");

		let a = bridge.create(&Source::network("a")).await.unwrap_err();
		let b = bridge.create(&Source::network("b")).await.unwrap_err();
		assert_ne!(a.token, b.token);
		assert_eq!(bridge.len(), 2);
	}

	#[tokio::test]
	async fn create_and_play() {
		let engine = MockEngine::default();
		engine.set_info(MediaInfo {
			duration: Duration::from_secs(10),
			video: vec![VideoStream {
				width: 640,
				height: 360,
			}],
		});

		let bridge = bridge(&engine, r#"{ "maxWidth": 1280, "player": { "cache": 1 } }"#);
		let source = Source::network("https://x/a.m3u8")
			.with_header("Cookie", "a=b")
			.with_header("Referer", "https://x");

		let id = bridge.create(&source).await.unwrap();
		assert_eq!(id.get(), 1);

		let calls = engine.player_calls(0);
		assert_eq!(
			calls[..4],
			[
				Call::CreatePlayer(0),
				Call::Property(0, PROTOCOL_WHITELIST_PROPERTY.into(), source::PROTOCOL_WHITELIST.into()),
				Call::Property(0, HEADERS_PROPERTY.into(), "Cookie: a=b\r\nReferer: https://x\r\n".into()),
				Call::Property(0, "cache".into(), "1".into()),
			]
		);
		assert!(calls.contains(&Call::Decoders(
			0,
			MediaKind::Video,
			vec!["VAAPI".into(), "CUDA".into(), "VDPAU".into(), "FFmpeg".into()]
		)));
		assert!(calls.contains(&Call::Prepare(0, Duration::ZERO, PREPARE_FLAGS)));
		assert!(calls.iter().any(|call| matches!(
			call,
			Call::UpdateSurface(0, options) if options.max_width == Some(1280)
		)));

		let mut events = bridge.events(id).unwrap();
		assert!(matches!(bridge.events(id), Err(crate::Error::AlreadySubscribed)));
		assert!(events.next().now_or_never().is_none());

		let listener = engine.listener(0);
		listener.status(Status::LOADING);
		listener.status(Status::LOADED);
		listener.status(Status::LOADED);
		listener.state(PlaybackState::Playing);

		assert_eq!(
			events.next().await,
			Some(Event::Initialized {
				duration: Duration::from_secs(10),
				width: 640,
				height: 360
			})
		);
		assert_eq!(events.next().await, Some(Event::IsPlayingChanged(true)));

		bridge.play(id).await;
		bridge.seek_to(id, Duration::from_millis(1500)).await;
		assert!(engine.player_calls(0).ends_with(&[
			Call::State(0, PlaybackState::Playing),
			Call::Seek(0, Duration::from_millis(1500), SEEK_FLAGS),
		]));

		bridge.dispose(id).await;
		assert_eq!(events.next().await, None);
		assert!(engine.released(0));
	}

	#[tokio::test]
	async fn low_latency() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, r#"{ "lowLatency": 2 }"#);
		bridge.create(&Source::network("rtsp://cam")).await.unwrap();

		let calls = engine.player_calls(0);
		assert!(calls.contains(&Call::Property(0, "avformat.fflags".into(), "+nobuffer".into())));
		assert!(calls.contains(&Call::BufferRange(0, Duration::ZERO, Duration::from_secs(1), true)));
	}

	#[tokio::test]
	async fn low_latency_unbounded() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, r#"{ "lowLatency": 1 }"#);
		bridge.create(&Source::network("rtsp://cam")).await.unwrap();

		assert!(
			engine
				.player_calls(0)
				.contains(&Call::BufferRange(0, Duration::ZERO, UNBOUNDED, false))
		);
	}

	#[tokio::test]
	async fn dispose_waits_for_in_flight() {
		let engine = MockEngine::default();
		engine.set_buffering(Duration::from_secs(2), Duration::ZERO);
		let bridge = bridge(&engine, "{}");
		let id = bridge.create(&Source::network("https://x/a.mp4")).await.unwrap();

		// A call that looked up the session, and hasn't reached the player yet.
		let session = bridge.session(id).unwrap();
		let (resume, resumed) = tokio::sync::oneshot::channel::<()>();
		let in_flight = tokio::spawn(async move {
			resumed.await.unwrap();
			session.player().map(|player| player.position())
		});

		bridge.dispose(id).await;
		assert!(bridge.is_empty());
		assert!(!engine.released(0));

		// The player is still usable, and released once the call is done.
		resume.send(()).unwrap();
		assert_eq!(in_flight.await.unwrap(), Some(Duration::from_secs(2)));
		assert!(engine.released(0));
	}

	#[tokio::test]
	async fn unknown_session() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, "{}");
		let id = SurfaceId::new(7).unwrap();

		bridge.dispose(id).await;
		bridge.play(id).await;
		bridge.set_volume(id, 0.5).await;
		bridge.set_looping(Key::Failed(FailureToken::new(3)), true).await;
		assert_eq!(bridge.get_position(id).await, Duration::ZERO);
		assert_eq!(bridge.position(id).await, None);

		assert!(matches!(bridge.events(id), Err(crate::Error::NotFound)));
		assert!(engine.calls().is_empty());
	}

	#[tokio::test]
	async fn controls() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, "{}");
		let id = bridge.create(&Source::network("https://x/a.mp4")).await.unwrap();

		bridge.set_looping(id, true).await;
		bridge.set_looping(id, false).await;
		bridge.set_volume(id, 3.0).await;
		bridge.set_playback_speed(id, -1.0).await;
		bridge.fast_seek_to(id, Duration::from_secs(4)).await;

		assert!(engine.player_calls(0).ends_with(&[
			Call::Loop(0, LOOP_FOREVER),
			Call::Loop(0, 0),
			Call::Volume(0, 3.0),
			Call::Rate(0, -1.0),
			Call::Seek(0, Duration::from_secs(4), SeekFlags::FROM_START | SeekFlags::KEY_FRAME),
		]));
	}

	#[tokio::test]
	async fn get_position_publishes_buffering() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, "{}");
		let id = bridge.create(&Source::network("https://x/a.mp4")).await.unwrap();
		let mut events = bridge.events(id).unwrap();

		engine.set_buffering(Duration::from_secs(3), Duration::from_secs(2));
		assert_eq!(bridge.get_position(id).await, Duration::from_secs(3));
		assert_eq!(bridge.position(id).await, Some(Duration::from_secs(3)));

		assert_eq!(
			events.next().await,
			Some(Event::BufferingUpdate {
				start: Duration::from_secs(3),
				end: Duration::from_secs(5)
			})
		);
	}

	#[tokio::test]
	async fn init_disposes_everything() {
		let engine = MockEngine::default();
		let bridge = bridge(&engine, "{}");

		bridge.create(&Source::network("a")).await.unwrap();
		bridge.create(&Source::network("b")).await.unwrap();
		assert_eq!(bridge.len(), 2);

		bridge.init().await;
		assert!(bridge.is_empty());
		assert!(engine.released(0));
		assert!(engine.released(1));
	}
}
