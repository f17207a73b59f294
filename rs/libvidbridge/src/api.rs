use std::{
	ffi::{c_char, c_void},
	str::FromStr,
	time::Duration,
};

use tracing::Level;
use vidbridge::{EngineEvent, MediaKind, PlaybackState, Status};

use crate::{
	Error, OnEvent, State, VbEngine, VbMediaInfo, VbSource,
	ffi::{self, Callback, OnStatus},
	native,
};

/// Initialize logging with a level.
///
/// This should be called before any other functions, unless the process already installed
/// a `tracing` subscriber. The level is a string: "error", "warn", "info", "debug", "trace".
/// The engine's own verbosity follows it.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that level is a valid null-terminated C string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_log_level(level: *const c_char) -> i32 {
	ffi::return_code(move || {
		match unsafe { ffi::parse_str(level)? } {
			"" => vidbridge::Log::default(),
			level => vidbridge::Log::new(Level::from_str(level).map_err(|_| Error::LogLevel(level.to_string()))?),
		}
		.init();

		Ok(())
	})
}

/// Provide the engine.
///
/// The first call wires up the engine. Later calls dispose every session instead, ex. after
/// the host restarted.
///
/// Returns a zero on success, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that engine points to a valid table.
/// - Every function in the table must stay valid, and be callable from any thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_init(engine: *const VbEngine) -> i32 {
	ffi::return_code(move || {
		let engine = unsafe { engine.as_ref() }.ok_or(Error::InvalidPointer)?;
		State::lock()?.init(*engine);
		Ok(())
	})
}

/// Register as the active player, configured by a JSON object (or null).
///
/// If the options exclude this platform, whatever was active before is restored and
/// the "excluded" code is returned. The engine itself is configured on the first [vb_create].
///
/// # Safety
/// - The caller must ensure that options is a valid null-terminated C string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_register(options: *const c_char) -> i32 {
	ffi::return_code(move || {
		let options = match unsafe { ffi::parse_str(options)? } {
			"" => "null",
			options => options,
		};
		State::lock()?.register(options)
	})
}

/// Returns 1 if a registered bridge is the active player, 0 otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn vb_is_active() -> i32 {
	ffi::return_code(|| Ok::<_, Error>(State::lock()?.is_active() as i32))
}

/// Create a session: open the media and bind a render surface.
///
/// The callback is called once with the session id: the surface id on success,
/// or a negative id on failure. Either way, subscribe with [vb_events] to find out more;
/// a failed session delivers a single error event and is disposed afterwards.
///
/// Returns a zero if creation started, or a negative code on (immediate) failure.
///
/// # Safety
/// - The caller must ensure that source and its strings are valid for the duration of this call.
/// - The caller must ensure that on_created is a valid function pointer, or null.
/// - The caller must ensure that user_data is a valid pointer until the callback was called.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_create(
	source: *const VbSource,
	on_created: Option<OnStatus>,
	user_data: *mut c_void,
) -> i32 {
	ffi::return_code(move || {
		let source = unsafe { source.as_ref() }.ok_or(Error::InvalidPointer)?;
		let source = unsafe { source.parse()? };
		let on_created = unsafe { Callback::new(user_data, on_created) };
		State::lock()?.create(source, on_created)
	})
}

/// Subscribe to the session's events.
///
/// Events produced before subscribing are buffered; each session can only be subscribed once.
/// The callback is called for every event, and a final time with `VB_EVENT_CLOSED`.
///
/// Returns a non-negative subscription id, or a negative code on failure.
///
/// # Safety
/// - The caller must ensure that on_event is a valid function pointer, or null.
/// - The caller must ensure that user_data is a valid pointer until the closed event.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_events(id: i64, on_event: Option<OnEvent>, user_data: *mut c_void) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let on_event = unsafe { Callback::new(user_data, on_event) };
		State::lock()?.events(key, on_event)
	})
}

/// Stop delivering events; the session keeps playing.
#[unsafe(no_mangle)]
pub extern "C" fn vb_events_close(subscription: i32) -> i32 {
	ffi::return_code(move || {
		let subscription = usize::try_from(subscription).map_err(|_| Error::InvalidId)?;
		State::lock()?.events_close(subscription)
	})
}

/// Dispose the session and release its player. Unknown ids are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn vb_dispose(id: i64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.dispose(key).await })
	})
}

#[unsafe(no_mangle)]
pub extern "C" fn vb_play(id: i64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.play(key).await })
	})
}

#[unsafe(no_mangle)]
pub extern "C" fn vb_pause(id: i64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.pause(key).await })
	})
}

#[unsafe(no_mangle)]
pub extern "C" fn vb_set_looping(id: i64, looping: bool) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.set_looping(key, looping).await })
	})
}

#[unsafe(no_mangle)]
pub extern "C" fn vb_set_volume(id: i64, volume: f64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.set_volume(key, volume).await })
	})
}

#[unsafe(no_mangle)]
pub extern "C" fn vb_set_playback_speed(id: i64, speed: f64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		State::lock()?.control(move |bridge| async move { bridge.set_playback_speed(key, speed).await })
	})
}

/// Seek within the buffer, to the keyframe before the position.
#[unsafe(no_mangle)]
pub extern "C" fn vb_seek_to(id: i64, position_ms: u64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let position = Duration::from_millis(position_ms);
		State::lock()?.control(move |bridge| async move { bridge.seek_to(key, position).await })
	})
}

/// Seek to the keyframe before the position, even if it's not buffered.
#[unsafe(no_mangle)]
pub extern "C" fn vb_fast_seek_to(id: i64, position_ms: u64) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let position = Duration::from_millis(position_ms);
		State::lock()?.control(move |bridge| async move { bridge.fast_seek_to(key, position).await })
	})
}

/// Query the position in milliseconds, also publishing a buffering update event.
///
/// The callback is called once; with zero for unknown sessions.
///
/// # Safety
/// - The caller must ensure that on_position is a valid function pointer, or null.
/// - The caller must ensure that user_data is a valid pointer until the callback was called.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_get_position(id: i64, on_position: Option<OnStatus>, user_data: *mut c_void) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let mut on_position = unsafe { Callback::new(user_data, on_position) };

		State::lock()?.control(move |bridge| async move {
			let position = bridge.get_position(key).await;
			on_position.call_raw(i64::try_from(position.as_millis()).unwrap_or(i64::MAX));
		})
	})
}

/// Query the media information.
///
/// The callback is called once; with null for unknown sessions.
///
/// # Safety
/// - The caller must ensure that on_info is a valid function pointer, or null.
/// - The caller must ensure that user_data is a valid pointer until the callback was called.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_media_info(
	id: i64,
	on_info: Option<extern "C" fn(user_data: *mut c_void, info: *const VbMediaInfo)>,
	user_data: *mut c_void,
) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let mut on_info = unsafe { Callback::new(user_data, on_info) };

		State::lock()?.control(move |bridge| async move {
			let info = bridge.media_info(key).await.map(|info| {
				let video = info.video.first().copied().unwrap_or_default();
				VbMediaInfo {
					duration_ms: u64::try_from(info.duration.as_millis()).unwrap_or(u64::MAX),
					video_streams: u32::try_from(info.video.len()).unwrap_or(u32::MAX),
					width: video.width,
					height: video.height,
				}
			});

			if let Some((on_info, user_data)) = on_info.get() {
				match &info {
					Some(info) => on_info(user_data, info),
					None => on_info(user_data, std::ptr::null()),
				}
			}
		})
	})
}

/// Set an engine property on an open session.
///
/// # Safety
/// - The caller must ensure that key and value are valid null-terminated C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_set_property(id: i64, key: *const c_char, value: *const c_char) -> i32 {
	ffi::return_code(move || {
		let id = ffi::parse_key(id)?;
		let key = unsafe { ffi::parse_required(key)? }.to_string();
		let value = unsafe { ffi::parse_str(value)? }.to_string();
		State::lock()?.control(move |bridge| async move { bridge.set_property(id, &key, &value).await })
	})
}

/// Limit how much is buffered; `drop` skips ahead instead of growing past the maximum.
#[unsafe(no_mangle)]
pub extern "C" fn vb_set_buffer_range(id: i64, min_ms: u64, max_ms: u64, drop: bool) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let min = Duration::from_millis(min_ms);
		let max = Duration::from_millis(max_ms);
		State::lock()?.control(move |bridge| async move { bridge.set_buffer_range(key, min, max, drop).await })
	})
}

/// Select the active tracks of a kind: 0 video, 1 audio, 2 subtitle.
///
/// # Safety
/// - The caller must ensure that tracks points to len valid values, or is null if len is zero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_set_active_tracks(id: i64, kind: u32, tracks: *const u32, len: usize) -> i32 {
	ffi::return_code(move || {
		let key = ffi::parse_key(id)?;
		let kind = match kind {
			0 => MediaKind::Video,
			1 => MediaKind::Audio,
			2 => MediaKind::Subtitle,
			_ => return Err(Error::InvalidCode),
		};
		let tracks = unsafe { ffi::parse_slice(tracks, len)? }.to_vec();
		State::lock()?.control(move |bridge| async move { bridge.set_active_tracks(key, kind, &tracks).await })
	})
}

/// Report a player's status bitmask. Called by the engine.
#[unsafe(no_mangle)]
pub extern "C" fn vb_listener_status(listener: u64, status: u32) -> i32 {
	ffi::return_code(move || {
		let listener = native::listener(listener).ok_or(Error::InvalidId)?;
		listener.status(Status::from_bits_retain(status));
		Ok(())
	})
}

/// Report a player's transport state: 0 stopped, 1 playing, 2 paused. Called by the engine.
#[unsafe(no_mangle)]
pub extern "C" fn vb_listener_state(listener: u64, state: u32) -> i32 {
	ffi::return_code(move || {
		let listener = native::listener(listener).ok_or(Error::InvalidId)?;
		let state = u8::try_from(state)
			.ok()
			.and_then(|state| PlaybackState::try_from(state).ok())
			.ok_or(Error::InvalidCode)?;
		listener.state(state);
		Ok(())
	})
}

/// Report a generic player event. Called by the engine.
///
/// # Safety
/// - The caller must ensure that category and detail are valid null-terminated C strings, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_listener_event(
	listener: u64,
	category: *const c_char,
	detail: *const c_char,
	error: i64,
) -> i32 {
	ffi::return_code(move || {
		let listener = native::listener(listener).ok_or(Error::InvalidId)?;
		listener.event(EngineEvent {
			category: unsafe { ffi::parse_str(category)? }.to_string(),
			detail: unsafe { ffi::parse_str(detail)? }.to_string(),
			error,
		});
		Ok(())
	})
}

/// Complete a pending prepare or surface binding. Called by the engine.
#[unsafe(no_mangle)]
pub extern "C" fn vb_complete(request: u64, code: i64) -> i32 {
	ffi::return_code(move || match native::complete(request, code) {
		true => Ok(()),
		false => Err(Error::InvalidId),
	})
}

/// Forward an engine log line; levels are as in [VbEngine::set_log_level]. Called by the engine.
///
/// # Safety
/// - The caller must ensure that message is a valid null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vb_engine_log(level: u32, message: *const c_char) -> i32 {
	ffi::return_code(move || {
		native::log(level, unsafe { ffi::parse_str(message)? });
		Ok(())
	})
}
