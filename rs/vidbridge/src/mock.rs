//! A recording engine for tests.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
	Engine, Listener, LogHandler, LogLevel, MediaInfo, MediaKind, OptionValue, PlaybackState, Player, SeekFlags,
	SurfaceOptions,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	SetLogHandler,
	LogLevel(LogLevel),
	GlobalOption(String, OptionValue),
	CreatePlayer(usize),
	Property(usize, String, String),
	Decoders(usize, MediaKind, Vec<String>),
	Media(usize, String),
	Prepare(usize, Duration, SeekFlags),
	UpdateSurface(usize, SurfaceOptions),
	State(usize, PlaybackState),
	Seek(usize, Duration, SeekFlags),
	Loop(usize, i32),
	Volume(usize, f64),
	Rate(usize, f64),
	BufferRange(usize, Duration, Duration, bool),
	Tracks(usize, MediaKind, Vec<u32>),
	Release(usize),
}

struct Shared {
	calls: Vec<Call>,
	listeners: Vec<Listener>,
	log: Option<LogHandler>,

	no_player: bool,
	prepare: i64,
	surface: Option<i64>,
	next_surface: i64,
	info: MediaInfo,
	position: Duration,
	buffered: Duration,
}

impl Default for Shared {
	fn default() -> Self {
		Self {
			calls: Vec::new(),
			listeners: Vec::new(),
			log: None,
			no_player: false,
			prepare: 0,
			surface: None,
			next_surface: 1,
			info: MediaInfo::default(),
			position: Duration::ZERO,
			buffered: Duration::ZERO,
		}
	}
}

#[derive(Clone, Default)]
pub struct MockEngine {
	shared: Arc<Mutex<Shared>>,
}

impl MockEngine {
	pub fn calls(&self) -> Vec<Call> {
		self.shared.lock().calls.clone()
	}

	/// Calls made to a single player.
	pub fn player_calls(&self, index: usize) -> Vec<Call> {
		self.calls()
			.into_iter()
			.filter(|call| call_player(call) == Some(index))
			.collect()
	}

	pub fn listener(&self, index: usize) -> Listener {
		self.shared.lock().listeners[index].clone()
	}

	pub fn log(&self, level: u32, message: &str) {
		if let Some(log) = self.shared.lock().log.as_ref() {
			log(level, message);
		}
	}

	/// Fail to allocate every following player.
	pub fn set_no_player(&self) {
		self.shared.lock().no_player = true;
	}

	/// The result of every following prepare call.
	pub fn set_prepare(&self, code: i64) {
		self.shared.lock().prepare = code;
	}

	/// The result of every following surface binding, instead of incrementing ids.
	pub fn set_surface(&self, code: i64) {
		self.shared.lock().surface = Some(code);
	}

	pub fn set_info(&self, info: MediaInfo) {
		self.shared.lock().info = info;
	}

	pub fn set_buffering(&self, position: Duration, buffered: Duration) {
		let mut shared = self.shared.lock();
		shared.position = position;
		shared.buffered = buffered;
	}

	pub fn released(&self, index: usize) -> bool {
		self.calls().contains(&Call::Release(index))
	}
}

fn call_player(call: &Call) -> Option<usize> {
	Some(*match call {
		Call::CreatePlayer(i)
		| Call::Property(i, ..)
		| Call::Decoders(i, ..)
		| Call::Media(i, _)
		| Call::Prepare(i, ..)
		| Call::UpdateSurface(i, _)
		| Call::State(i, _)
		| Call::Seek(i, ..)
		| Call::Loop(i, _)
		| Call::Volume(i, _)
		| Call::Rate(i, _)
		| Call::BufferRange(i, ..)
		| Call::Tracks(i, ..)
		| Call::Release(i) => i,
		_ => return None,
	})
}

impl Engine for MockEngine {
	type Player = MockPlayer;

	fn set_log_handler(&self, handler: Option<LogHandler>) {
		let mut shared = self.shared.lock();
		shared.log = handler;
		shared.calls.push(Call::SetLogHandler);
	}

	fn set_log_level(&self, level: LogLevel) {
		self.shared.lock().calls.push(Call::LogLevel(level));
	}

	fn set_global_option(&self, key: &str, value: &OptionValue) {
		self.shared
			.lock()
			.calls
			.push(Call::GlobalOption(key.to_string(), value.clone()));
	}

	fn create_player(&self, listener: Listener) -> Option<MockPlayer> {
		let mut shared = self.shared.lock();
		if shared.no_player {
			return None;
		}

		let index = shared.listeners.len();
		shared.listeners.push(listener);
		shared.calls.push(Call::CreatePlayer(index));

		Some(MockPlayer {
			index,
			shared: self.shared.clone(),
		})
	}
}

pub struct MockPlayer {
	index: usize,
	shared: Arc<Mutex<Shared>>,
}

impl MockPlayer {
	fn record(&self, call: Call) {
		self.shared.lock().calls.push(call);
	}
}

impl Player for MockPlayer {
	fn set_property(&self, key: &str, value: &str) {
		self.record(Call::Property(self.index, key.to_string(), value.to_string()));
	}

	fn set_decoders(&self, kind: MediaKind, names: &[String]) {
		self.record(Call::Decoders(self.index, kind, names.to_vec()));
	}

	fn set_media(&self, url: &str) {
		self.record(Call::Media(self.index, url.to_string()));
	}

	async fn prepare(&self, start: Duration, flags: SeekFlags) -> i64 {
		self.record(Call::Prepare(self.index, start, flags));
		tokio::task::yield_now().await;
		self.shared.lock().prepare
	}

	async fn update_surface(&self, options: &SurfaceOptions) -> i64 {
		self.record(Call::UpdateSurface(self.index, *options));
		tokio::task::yield_now().await;

		let mut shared = self.shared.lock();
		match shared.surface {
			Some(code) => code,
			None => {
				shared.next_surface += 1;
				shared.next_surface - 1
			}
		}
	}

	fn set_state(&self, state: PlaybackState) {
		self.record(Call::State(self.index, state));
	}

	fn seek(&self, position: Duration, flags: SeekFlags) {
		self.record(Call::Seek(self.index, position, flags));
	}

	fn position(&self) -> Duration {
		self.shared.lock().position
	}

	fn buffered(&self) -> Duration {
		self.shared.lock().buffered
	}

	fn media_info(&self) -> MediaInfo {
		self.shared.lock().info.clone()
	}

	fn set_loop(&self, count: i32) {
		self.record(Call::Loop(self.index, count));
	}

	fn set_volume(&self, volume: f64) {
		self.record(Call::Volume(self.index, volume));
	}

	fn set_playback_rate(&self, rate: f64) {
		self.record(Call::Rate(self.index, rate));
	}

	fn set_buffer_range(&self, min: Duration, max: Duration, drop: bool) {
		self.record(Call::BufferRange(self.index, min, max, drop));
	}

	fn set_active_tracks(&self, kind: MediaKind, tracks: &[u32]) {
		self.record(Call::Tracks(self.index, kind, tracks.to_vec()));
	}
}

impl Drop for MockPlayer {
	fn drop(&mut self) {
		self.record(Call::Release(self.index));
	}
}
