//! The seam between the bridge and a native decoding engine.
//!
//! The engine is callback driven: it reports media status snapshots, playback state changes and
//! generic events from its own threads. Instead of registering three separate callbacks, each
//! [Player] is created with a [Listener] that funnels everything into one ordered channel.

use std::{fmt, future::Future, time::Duration};

use tokio::sync::mpsc;

bitflags::bitflags! {
	/// A level-triggered media status snapshot, using the engine's bit values.
	#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Status: u32 {
		const UNLOADED = 1;
		const LOADING = 1 << 1;
		const LOADED = 1 << 2;
		const STALLED = 1 << 3;
		const BUFFERING = 1 << 4;
		const BUFFERED = 1 << 5;
		const END = 1 << 6;
		const SEEKING = 1 << 7;
		const PREPARED = 1 << 8;
		const INVALID = 1 << 31;
	}
}

bitflags::bitflags! {
	/// Seek behavior, using the engine's bit values.
	#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct SeekFlags: u32 {
		/// The position is absolute, measured from the start of the media.
		const FROM_START = 1;
		/// Snap to the nearest keyframe.
		const KEY_FRAME = 1 << 8;
		/// Only use data that is already buffered locally.
		const IN_CACHE = 1 << 10;
	}
}

/// The transport state of a player.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum PlaybackState {
	#[default]
	Stopped = 0,
	Playing = 1,
	Paused = 2,
}

/// The engine's log severities.
///
/// Raw values outside of this set can't be converted and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u32)]
pub enum LogLevel {
	Off = 0,
	Error = 1,
	Warning = 2,
	Info = 3,
	Debug = 4,
	All = 5,
}

/// The kind of stream a decoder list or track selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum MediaKind {
	Video = 0,
	Audio = 1,
	Subtitle = 2,
}

/// A global option value.
///
/// Values are forwarded to the engine untouched; the engine decides what a wrong type means.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
}

impl OptionValue {
	/// Convert an arbitrary JSON value, stringifying anything that isn't a scalar.
	pub fn from_json(value: &serde_json::Value) -> Self {
		match value {
			serde_json::Value::Bool(b) => Self::Bool(*b),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(i) => Self::Int(i),
				None => Self::Float(n.as_f64().unwrap_or_default()),
			},
			serde_json::Value::String(s) => Self::String(s.clone()),
			other => Self::String(other.to_string()),
		}
	}
}

impl fmt::Display for OptionValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{}", u8::from(*b)),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(v) => write!(f, "{v}"),
			Self::String(s) => f.write_str(s),
		}
	}
}

impl From<&str> for OptionValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<i64> for OptionValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

/// Geometry of a single video stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VideoStream {
	pub width: u32,
	pub height: u32,
}

/// What the engine knows about the opened media.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaInfo {
	/// Zero for live streams or when the duration is unknown.
	pub duration: Duration,
	pub video: Vec<VideoStream>,
}

/// Constraints applied when binding a render surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
	pub max_width: Option<u32>,
	pub max_height: Option<u32>,

	/// Fit within the maximum size instead of cropping to it.
	pub fit_max_size: bool,

	/// Passthrough rendering, bypassing the texture copy.
	pub tunnel: bool,
}

/// A generic engine event, ex. `reader.buffering`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineEvent {
	pub category: String,
	pub detail: String,
	pub error: i64,
}

/// A raw notification produced by the engine for a single player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
	Status(Status),
	State(PlaybackState),
	Event(EngineEvent),
}

/// Receives a player's notifications, from any thread.
///
/// Notifications are delivered in the order they were produced.
#[derive(Debug, Clone)]
pub struct Listener {
	tx: mpsc::UnboundedSender<Notification>,
}

impl Listener {
	/// A listener and the receiving end of its notifications.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	/// Report a new media status snapshot.
	pub fn status(&self, status: Status) {
		self.notify(Notification::Status(status));
	}

	/// Report a new transport state, even if it didn't change.
	pub fn state(&self, state: PlaybackState) {
		self.notify(Notification::State(state));
	}

	/// Report a generic event.
	pub fn event(&self, event: EngineEvent) {
		self.notify(Notification::Event(event));
	}

	fn notify(&self, notification: Notification) {
		// The session is gone, nobody cares anymore.
		let _ = self.tx.send(notification);
	}
}

/// Forwards one engine log line, with the raw engine level.
pub type LogHandler = Box<dyn Fn(u32, &str) + Send + Sync>;

/// The creation error code when the engine couldn't allocate a player.
pub const NO_PLAYER: i64 = -1;

/// A process-wide native decoding engine.
pub trait Engine: Send + Sync + 'static {
	type Player: Player;

	/// Install (or remove) the log sink.
	fn set_log_handler(&self, handler: Option<LogHandler>);

	/// The verbosity of log lines passed to the log sink.
	fn set_log_level(&self, level: LogLevel);

	fn set_global_option(&self, key: &str, value: &OptionValue);

	/// Create a new native player that reports to the given listener.
	///
	/// Returns [None] if the engine couldn't allocate one.
	fn create_player(&self, listener: Listener) -> Option<Self::Player>;
}

/// A single native decoder instance.
///
/// The native handle is released when this is dropped.
pub trait Player: Send + Sync + 'static {
	fn set_property(&self, key: &str, value: &str);

	/// The ordered list of decoder backends to try.
	fn set_decoders(&self, kind: MediaKind, names: &[String]);

	fn set_media(&self, url: &str);

	/// Open the media and seek to `start`, returning a negative code on failure.
	fn prepare(&self, start: Duration, flags: SeekFlags) -> impl Future<Output = i64> + Send;

	/// Negotiate the video size and bind a render surface.
	///
	/// Returns the surface id, or a negative code on failure.
	fn update_surface(&self, options: &SurfaceOptions) -> impl Future<Output = i64> + Send;

	fn set_state(&self, state: PlaybackState);

	fn seek(&self, position: Duration, flags: SeekFlags);

	fn position(&self) -> Duration;

	/// The amount of media buffered ahead of the current position.
	fn buffered(&self) -> Duration;

	fn media_info(&self) -> MediaInfo;

	/// The number of extra loops, or `-1` to loop forever.
	fn set_loop(&self, count: i32);

	fn set_volume(&self, volume: f64);

	fn set_playback_rate(&self, rate: f64);

	/// Keep between `min` and `max` buffered, where a `max` of [crate::UNBOUNDED] means no limit.
	/// With `drop`, frames are skipped instead of buffering past `max`.
	fn set_buffer_range(&self, min: Duration, max: Duration, drop: bool);

	fn set_active_tracks(&self, kind: MediaKind, tracks: &[u32]);
}
