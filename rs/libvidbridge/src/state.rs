use std::{
	any::Any,
	ffi::{CString, c_char, c_void},
	future::Future,
	ops::{Deref, DerefMut},
	sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use slab::Slab;
use tokio::{runtime::EnterGuard, sync::oneshot};
use vidbridge::{Bridge, Event, EventStream, Host, InstanceSlot, Key, Location, PlayerPlatform, Registrar, Source};

use crate::{
	Error, NativeEngine, VbEngine,
	ffi::{self, Callback, OnStatus},
	runtime,
};

pub const VB_EVENT_CLOSED: u32 = 0;
pub const VB_EVENT_INITIALIZED: u32 = 1;
pub const VB_EVENT_BUFFERING_START: u32 = 2;
pub const VB_EVENT_BUFFERING_END: u32 = 3;
pub const VB_EVENT_BUFFERING_UPDATE: u32 = 4;
pub const VB_EVENT_IS_PLAYING_CHANGED: u32 = 5;
pub const VB_EVENT_ERROR: u32 = 6;

/// A playback event, valid for the duration of the callback.
#[repr(C)]
pub struct VbEvent {
	/// One of the `VB_EVENT_*` constants.
	pub kind: u32,

	/// Initialized only; [u64::MAX] for live streams.
	pub duration_ms: u64,
	pub width: u32,
	pub height: u32,

	/// Buffering updates only.
	pub start_ms: u64,
	pub end_ms: u64,

	/// Playing changes only.
	pub playing: bool,

	/// Errors only: the error code (ex. "media open error") and a description.
	pub code: *const c_char,
	pub message: *const c_char,
}

pub type OnEvent = extern "C" fn(user_data: *mut c_void, event: *const VbEvent);

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl VbEvent {
	fn new(kind: u32) -> Self {
		Self {
			kind,
			duration_ms: 0,
			width: 0,
			height: 0,
			start_ms: 0,
			end_ms: 0,
			playing: false,
			code: std::ptr::null(),
			message: std::ptr::null(),
		}
	}
}

// Strings borrowed by a [VbEvent], kept alive for the callback.
#[derive(Default)]
struct EventStrings {
	code: Option<CString>,
	message: Option<CString>,
}

fn convert(event: &Event, strings: &mut EventStrings) -> VbEvent {
	match event {
		Event::Initialized {
			duration,
			width,
			height,
		} => VbEvent {
			duration_ms: millis(*duration),
			width: *width,
			height: *height,
			..VbEvent::new(VB_EVENT_INITIALIZED)
		},
		Event::BufferingStart => VbEvent::new(VB_EVENT_BUFFERING_START),
		Event::BufferingEnd => VbEvent::new(VB_EVENT_BUFFERING_END),
		Event::BufferingUpdate { start, end } => VbEvent {
			start_ms: millis(*start),
			end_ms: millis(*end),
			..VbEvent::new(VB_EVENT_BUFFERING_UPDATE)
		},
		Event::IsPlayingChanged(playing) => VbEvent {
			playing: *playing,
			..VbEvent::new(VB_EVENT_IS_PLAYING_CHANGED)
		},
		Event::Error { kind, message } => {
			let code = strings.code.insert(CString::new(kind.as_str()).unwrap_or_default());
			let code = code.as_ptr();
			let message = strings
				.message
				.insert(CString::new(message.replace('\0', "")).unwrap_or_default())
				.as_ptr();

			VbEvent {
				code,
				message,
				..VbEvent::new(VB_EVENT_ERROR)
			}
		}
	}
}

/// The media to open.
#[repr(C)]
pub struct VbSource {
	/// 0 network, 1 file, 2 asset, 3 content uri.
	pub kind: u32,
	pub uri: *const c_char,

	/// Assets only: the package the asset belongs to, or null.
	pub package: *const c_char,

	/// A container format hint, or null.
	pub format: *const c_char,

	/// Alternating header names and values.
	pub headers: *const *const c_char,
	pub headers_len: usize,
}

impl VbSource {
	/// # Safety
	///
	/// The caller must ensure that every pointer is valid.
	pub unsafe fn parse(&self) -> Result<Source, Error> {
		let uri = unsafe { ffi::parse_required(self.uri)? }.to_string();
		let location = match self.kind {
			0 => Location::Network(uri),
			1 => Location::File(uri),
			2 => Location::Asset {
				name: uri,
				package: match unsafe { ffi::parse_str(self.package)? } {
					"" => None,
					package => Some(package.to_string()),
				},
			},
			3 => Location::ContentUri(uri),
			_ => return Err(Error::InvalidCode),
		};

		let mut source = Source::new(location);
		source.format = match unsafe { ffi::parse_str(self.format)? } {
			"" => None,
			format => Some(format.to_string()),
		};

		let headers = unsafe { ffi::parse_slice(self.headers, self.headers_len)? };
		for pair in headers.chunks_exact(2) {
			let name = unsafe { ffi::parse_required(pair[0])? };
			let value = unsafe { ffi::parse_str(pair[1])? };
			source = source.with_header(name, value);
		}

		Ok(source)
	}
}

/// Whatever the host used before we registered.
struct HostPlatform;

impl PlayerPlatform for HostPlatform {
	fn name(&self) -> &str {
		"host"
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

pub struct State {
	registrar: Option<Registrar<NativeEngine>>,
	slot: InstanceSlot,

	// The bridge installed by the last registration, if it wasn't excluded.
	bridge: Option<Arc<Bridge<NativeEngine>>>,

	// Event subscriptions, dropped to stop delivery.
	subscriptions: Slab<oneshot::Sender<()>>,
}

impl Default for State {
	fn default() -> Self {
		Self {
			registrar: None,
			slot: InstanceSlot::new(Arc::new(HostPlatform)),
			bridge: None,
			subscriptions: Slab::new(),
		}
	}
}

static STATE: LazyLock<Mutex<State>> = LazyLock::new(Default::default);

/// The locked global state, with the runtime entered so sessions can be spawned.
pub struct StateGuard {
	state: MutexGuard<'static, State>,
	_runtime: EnterGuard<'static>,
}

impl Deref for StateGuard {
	type Target = State;

	fn deref(&self) -> &State {
		&self.state
	}
}

impl DerefMut for StateGuard {
	fn deref_mut(&mut self) -> &mut State {
		&mut self.state
	}
}

impl State {
	/// A panic while locked was already reported to the caller, so poisoning is ignored.
	pub fn lock() -> Result<StateGuard, Error> {
		let runtime = runtime::enter()?;
		let state = STATE.lock().unwrap_or_else(PoisonError::into_inner);

		Ok(StateGuard {
			state,
			_runtime: runtime,
		})
	}

	/// Set up the engine, or dispose every session if that already happened.
	pub fn init(&mut self, engine: VbEngine) {
		if let Some(bridge) = self.bridge.clone() {
			tokio::spawn(async move { bridge.init().await });
			return;
		}

		if self.registrar.is_none() {
			// SAFETY: Checked by the caller of vb_init.
			let engine = unsafe { NativeEngine::new(engine) };
			self.registrar = Some(Registrar::new(engine, Host::default()));
		}
	}

	pub fn register(&mut self, options: &str) -> Result<(), Error> {
		let registrar = self.registrar.as_ref().ok_or(Error::NotRegistered)?;

		self.bridge = registrar.register_json(&self.slot, options)?;
		match self.bridge {
			Some(_) => Ok(()),
			None => Err(vidbridge::Error::Excluded.into()),
		}
	}

	/// Returns true if one of our bridges is the active implementation.
	pub fn is_active(&self) -> bool {
		self.slot.get().as_any().is::<Bridge<NativeEngine>>()
	}

	fn bridge(&self) -> Result<Arc<Bridge<NativeEngine>>, Error> {
		self.bridge.clone().ok_or(Error::NotRegistered)
	}

	pub fn create(&mut self, source: Source, mut on_created: Callback<OnStatus>) -> Result<(), Error> {
		let bridge = self.bridge()?;

		tokio::spawn(async move {
			let key = match bridge.create(&source).await {
				Ok(id) => Key::Surface(id),
				Err(err) => Key::Failed(err.token),
			};
			on_created.call_raw(key.to_raw());
		});

		Ok(())
	}

	/// Run a control on the runtime; unknown sessions are ignored.
	pub fn control<F, Fut>(&mut self, f: F) -> Result<(), Error>
	where
		F: FnOnce(Arc<Bridge<NativeEngine>>) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let bridge = self.bridge()?;
		tokio::spawn(f(bridge));
		Ok(())
	}

	pub fn events(&mut self, key: Key, mut on_event: Callback<OnEvent>) -> Result<usize, Error> {
		let stream = self.bridge()?.events(key)?;
		let closed = oneshot::channel();
		let id = self.subscriptions.insert(closed.0);

		tokio::spawn(async move {
			tokio::select! {
				// No more sender, which means [State::events_close] was called.
				_ = closed.1 => {},
				_ = Self::events_run(stream, &mut on_event) => {},
			}

			if let Some((on_event, user_data)) = on_event.get() {
				on_event(user_data, &VbEvent::new(VB_EVENT_CLOSED));
			}
		});

		Ok(id)
	}

	async fn events_run(mut stream: EventStream, on_event: &mut Callback<OnEvent>) {
		while let Some(event) = stream.next().await {
			let mut strings = EventStrings::default();
			let event = convert(&event, &mut strings);

			if let Some((on_event, user_data)) = on_event.get() {
				on_event(user_data, &event);
			}
		}
	}

	pub fn events_close(&mut self, id: usize) -> Result<(), Error> {
		self.subscriptions.try_remove(id).ok_or(Error::InvalidId)?;
		Ok(())
	}
}
