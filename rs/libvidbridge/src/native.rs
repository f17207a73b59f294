//! The engine, implemented by C function pointers.

use std::{
	ffi::{CString, c_char, c_void},
	future::Future,
	ptr::NonNull,
	sync::{LazyLock, Mutex, PoisonError},
	time::Duration,
};

use slab::Slab;
use tokio::sync::oneshot;
use vidbridge::{
	Engine, Listener, LogHandler, LogLevel, MediaInfo, MediaKind, OptionValue, PlaybackState, Player, SeekFlags,
	SurfaceOptions, VideoStream,
};

/// Returned to a pending prepare or surface binding when the engine dropped the request.
pub const CANCELLED: i64 = -1;

/// Media information, filled in by the engine.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VbMediaInfo {
	/// Zero if unknown, ex. a live stream.
	pub duration_ms: u64,

	/// The number of video streams; the size is the first one's.
	pub video_streams: u32,
	pub width: u32,
	pub height: u32,
}

/// The engine's function table.
///
/// Every function receives `user_data` first. Missing functions are skipped, and missing
/// queries report zero.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VbEngine {
	pub user_data: *mut c_void,

	/// Verbosity: 0 off, 1 error, 2 warning, 3 info, 4 debug, 5 all.
	/// Log lines are reported with [crate::vb_engine_log].
	pub set_log_level: Option<extern "C" fn(user_data: *mut c_void, level: u32)>,
	pub set_global_option: Option<extern "C" fn(user_data: *mut c_void, key: *const c_char, value: *const c_char)>,

	/// Create a player, reporting its notifications to `listener` with the `vb_listener_*` functions.
	/// Returns null on failure, which fails the session with a media open error.
	pub create_player: Option<extern "C" fn(user_data: *mut c_void, listener: u64) -> *mut c_void>,
	pub release_player: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void)>,

	pub set_property:
		Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, key: *const c_char, value: *const c_char)>,

	/// Comma separated names, in order of preference.
	pub set_decoders:
		Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, kind: u32, names: *const c_char)>,
	pub set_media: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, url: *const c_char)>,

	/// Completed with [crate::vb_complete].
	pub prepare:
		Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, start_ms: i64, flags: u32, request: u64)>,

	/// Completed with [crate::vb_complete], using the surface id. Sizes are zero if unbounded.
	pub update_surface: Option<
		extern "C" fn(
			user_data: *mut c_void,
			player: *mut c_void,
			max_width: u32,
			max_height: u32,
			fit_max_size: bool,
			tunnel: bool,
			request: u64,
		),
	>,

	/// 0 stopped, 1 playing, 2 paused.
	pub set_state: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, state: u32)>,
	pub seek: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, position_ms: i64, flags: u32)>,
	pub position: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void) -> i64>,
	pub buffered: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void) -> i64>,
	pub media_info: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, dst: *mut VbMediaInfo)>,

	/// -1 repeats forever.
	pub set_loop: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, count: i32)>,
	pub set_volume: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, volume: f64)>,
	pub set_playback_rate: Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, rate: f64)>,
	/// `max_ms` is zero if unbounded.
	pub set_buffer_range:
		Option<extern "C" fn(user_data: *mut c_void, player: *mut c_void, min_ms: i64, max_ms: i64, drop: bool)>,
	pub set_active_tracks: Option<
		extern "C" fn(user_data: *mut c_void, player: *mut c_void, kind: u32, tracks: *const u32, len: usize),
	>,
}

impl Default for VbEngine {
	fn default() -> Self {
		Self {
			user_data: std::ptr::null_mut(),
			set_log_level: None,
			set_global_option: None,
			create_player: None,
			release_player: None,
			set_property: None,
			set_decoders: None,
			set_media: None,
			prepare: None,
			update_surface: None,
			set_state: None,
			seek: None,
			position: None,
			buffered: None,
			media_info: None,
			set_loop: None,
			set_volume: None,
			set_playback_rate: None,
			set_buffer_range: None,
			set_active_tracks: None,
		}
	}
}

// SAFETY: The engine is called from the runtime thread and from caller threads.
// The C side MUST guarantee that every function and user_data are thread-safe.
unsafe impl Send for VbEngine {}
unsafe impl Sync for VbEngine {}

// Listeners by id, so the engine can report notifications.
static LISTENERS: LazyLock<Mutex<Slab<Listener>>> = LazyLock::new(Default::default);

// Pending asynchronous engine calls by request id.
static PENDING: LazyLock<Mutex<Slab<oneshot::Sender<i64>>>> = LazyLock::new(Default::default);

// The engine's log lines go here.
static LOG_HANDLER: Mutex<Option<LogHandler>> = Mutex::new(None);

pub fn listener(id: u64) -> Option<Listener> {
	let listeners = LISTENERS.lock().unwrap_or_else(PoisonError::into_inner);
	listeners.get(usize::try_from(id).ok()?).cloned()
}

/// Complete a pending request, returning false if it's unknown.
pub fn complete(request: u64, code: i64) -> bool {
	let Ok(request) = usize::try_from(request) else {
		return false;
	};

	let tx = PENDING
		.lock()
		.unwrap_or_else(PoisonError::into_inner)
		.try_remove(request);

	match tx {
		Some(tx) => tx.send(code).is_ok(),
		None => false,
	}
}

pub fn log(level: u32, message: &str) {
	if let Some(handler) = LOG_HANDLER.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
		handler(level, message);
	}
}

fn cstring(value: impl Into<Vec<u8>>) -> CString {
	CString::new(value).unwrap_or_else(|err| {
		tracing::warn!(%err, "truncating string with a nul byte");
		let end = err.nul_position();
		let mut value = err.into_vec();
		value.truncate(end);
		CString::new(value).unwrap_or_default()
	})
}

fn millis(duration: Duration) -> i64 {
	i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// Zero stands in for an unbounded limit.
fn limit(duration: Duration) -> i64 {
	if duration == vidbridge::UNBOUNDED {
		0
	} else {
		millis(duration)
	}
}

fn from_millis(ms: i64) -> Duration {
	Duration::from_millis(ms.max(0) as u64)
}

fn media_kind(kind: MediaKind) -> u32 {
	match kind {
		MediaKind::Video => 0,
		MediaKind::Audio => 1,
		MediaKind::Subtitle => 2,
	}
}

/// An [Engine] backed by a C function table.
pub struct NativeEngine {
	vtable: VbEngine,
}

impl NativeEngine {
	/// # Safety
	///
	/// The caller must ensure that every function pointer and user_data stay valid for the life
	/// of the process.
	pub unsafe fn new(vtable: VbEngine) -> Self {
		Self { vtable }
	}
}

impl Engine for NativeEngine {
	type Player = NativePlayer;

	fn set_log_handler(&self, handler: Option<LogHandler>) {
		*LOG_HANDLER.lock().unwrap_or_else(PoisonError::into_inner) = handler;
	}

	fn set_log_level(&self, level: LogLevel) {
		if let Some(f) = self.vtable.set_log_level {
			f(self.vtable.user_data, level.into());
		}
	}

	fn set_global_option(&self, key: &str, value: &OptionValue) {
		if let Some(f) = self.vtable.set_global_option {
			let key = cstring(key);
			let value = cstring(value.to_string());
			f(self.vtable.user_data, key.as_ptr(), value.as_ptr());
		}
	}

	fn create_player(&self, listener: Listener) -> Option<NativePlayer> {
		let f = self.vtable.create_player?;
		let listener = LISTENERS
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(listener);

		let Some(handle) = NonNull::new(f(self.vtable.user_data, listener as u64)) else {
			tracing::warn!(listener, "engine failed to create a player");
			LISTENERS
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.try_remove(listener);
			return None;
		};

		Some(NativePlayer {
			vtable: self.vtable,
			handle,
			listener,
		})
	}
}

/// A [Player] created by [NativeEngine]; released when dropped.
pub struct NativePlayer {
	vtable: VbEngine,
	handle: NonNull<c_void>,
	listener: usize,
}

// SAFETY: See [VbEngine]; the handle is only used through its functions.
unsafe impl Send for NativePlayer {}
unsafe impl Sync for NativePlayer {}

impl NativePlayer {
	fn handle(&self) -> *mut c_void {
		self.handle.as_ptr()
	}

	// Start an asynchronous engine call, resolved by [complete].
	fn request<F: FnOnce(u64)>(&self, start: F) -> impl Future<Output = i64> + Send + use<F> {
		let (tx, rx) = oneshot::channel();
		let request = PENDING.lock().unwrap_or_else(PoisonError::into_inner).insert(tx);

		start(request as u64);

		async move { rx.await.unwrap_or(CANCELLED) }
	}
}

impl Player for NativePlayer {
	fn set_property(&self, key: &str, value: &str) {
		if let Some(f) = self.vtable.set_property {
			let key = cstring(key);
			let value = cstring(value);
			f(self.vtable.user_data, self.handle(), key.as_ptr(), value.as_ptr());
		}
	}

	fn set_decoders(&self, kind: MediaKind, names: &[String]) {
		if let Some(f) = self.vtable.set_decoders {
			let names = cstring(names.join(","));
			f(self.vtable.user_data, self.handle(), media_kind(kind), names.as_ptr());
		}
	}

	fn set_media(&self, url: &str) {
		if let Some(f) = self.vtable.set_media {
			let url = cstring(url);
			f(self.vtable.user_data, self.handle(), url.as_ptr());
		}
	}

	fn prepare(&self, start: Duration, flags: SeekFlags) -> impl Future<Output = i64> + Send {
		let vtable = self.vtable;
		let handle = self.handle();

		self.request(move |request| match vtable.prepare {
			Some(f) => f(vtable.user_data, handle, millis(start), flags.bits(), request),
			None => {
				complete(request, 0);
			}
		})
	}

	fn update_surface(&self, options: &SurfaceOptions) -> impl Future<Output = i64> + Send {
		let vtable = self.vtable;
		let handle = self.handle();
		let options = *options;

		self.request(move |request| match vtable.update_surface {
			Some(f) => f(
				vtable.user_data,
				handle,
				options.max_width.unwrap_or_default(),
				options.max_height.unwrap_or_default(),
				options.fit_max_size,
				options.tunnel,
				request,
			),
			None => {
				complete(request, CANCELLED);
			}
		})
	}

	fn set_state(&self, state: PlaybackState) {
		if let Some(f) = self.vtable.set_state {
			f(self.vtable.user_data, self.handle(), u8::from(state).into());
		}
	}

	fn seek(&self, position: Duration, flags: SeekFlags) {
		if let Some(f) = self.vtable.seek {
			f(self.vtable.user_data, self.handle(), millis(position), flags.bits());
		}
	}

	fn position(&self) -> Duration {
		match self.vtable.position {
			Some(f) => from_millis(f(self.vtable.user_data, self.handle())),
			None => Duration::ZERO,
		}
	}

	fn buffered(&self) -> Duration {
		match self.vtable.buffered {
			Some(f) => from_millis(f(self.vtable.user_data, self.handle())),
			None => Duration::ZERO,
		}
	}

	fn media_info(&self) -> MediaInfo {
		let mut dst = VbMediaInfo::default();
		if let Some(f) = self.vtable.media_info {
			f(self.vtable.user_data, self.handle(), &mut dst);
		}

		let video = match dst.video_streams {
			0 => Vec::new(),
			_ => vec![VideoStream {
				width: dst.width,
				height: dst.height,
			}],
		};

		MediaInfo {
			duration: Duration::from_millis(dst.duration_ms),
			video,
		}
	}

	fn set_loop(&self, count: i32) {
		if let Some(f) = self.vtable.set_loop {
			f(self.vtable.user_data, self.handle(), count);
		}
	}

	fn set_volume(&self, volume: f64) {
		if let Some(f) = self.vtable.set_volume {
			f(self.vtable.user_data, self.handle(), volume);
		}
	}

	fn set_playback_rate(&self, rate: f64) {
		if let Some(f) = self.vtable.set_playback_rate {
			f(self.vtable.user_data, self.handle(), rate);
		}
	}

	fn set_buffer_range(&self, min: Duration, max: Duration, drop: bool) {
		if let Some(f) = self.vtable.set_buffer_range {
			f(self.vtable.user_data, self.handle(), millis(min), limit(max), drop);
		}
	}

	fn set_active_tracks(&self, kind: MediaKind, tracks: &[u32]) {
		if let Some(f) = self.vtable.set_active_tracks {
			f(self.vtable.user_data, self.handle(), media_kind(kind), tracks.as_ptr(), tracks.len());
		}
	}
}

impl Drop for NativePlayer {
	fn drop(&mut self) {
		LISTENERS
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.try_remove(self.listener);

		if let Some(f) = self.vtable.release_player {
			f(self.vtable.user_data, self.handle());
		}
	}
}
