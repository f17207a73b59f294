use std::{
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::{
	CreateError, Engine, ErrorKind, Event, EventSink, EventStream, FailureToken, Key, Listener, NO_PLAYER, Notification,
	Player, SeekFlags, SurfaceOptions, Translator,
};

/// Engine properties, applied in insertion order before the media is opened.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Properties {
	entries: Vec<(String, String)>,
}

impl Properties {
	/// Insert or overwrite a property, keeping its original position.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();

		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some((_, v)) => *v = value,
			None => self.entries.push((key, value)),
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[derive(Debug, Default)]
struct Config {
	properties: Properties,
	media: Option<String>,
	key: Option<Key>,
}

/// One native player, plus the state needed to turn its notifications into events.
///
/// Without a native player, the session can only fail to open.
pub(crate) struct Session<P: Player> {
	player: Option<P>,
	pub token: FailureToken,

	config: Mutex<Config>,
	sink: EventSink,

	// Dropped to stop the translator task.
	closed: Mutex<Option<oneshot::Sender<()>>>,
}

impl<P: Player> Session<P> {
	/// Create the native player and start translating its notifications.
	///
	/// Must be called within a tokio runtime.
	pub fn new<E: Engine<Player = P>>(engine: &E, token: FailureToken) -> Arc<Self> {
		let (listener, notifications) = Listener::new();
		let closed = oneshot::channel();

		let session = Arc::new(Self {
			player: engine.create_player(listener),
			token,
			config: Default::default(),
			sink: EventSink::new(),
			closed: Mutex::new(Some(closed.0)),
		});

		let weak = Arc::downgrade(&session);
		tokio::spawn(async move {
			tokio::select! {
				// No more sender, which means [Session::close] was called.
				_ = closed.1 => {},
				_ = Self::run(weak, notifications) => {},
			}
		});

		session
	}

	async fn run(weak: Weak<Self>, mut notifications: mpsc::UnboundedReceiver<Notification>) {
		let mut translator = Translator::new();

		while let Some(notification) = notifications.recv().await {
			// Don't keep the session alive while waiting.
			let Some(session) = weak.upgrade() else { return };
			let Some(player) = session.player() else { return };

			match notification {
				Notification::Status(status) => {
					for event in translator.on_status(status, || player.media_info()) {
						session.sink.send(event);
					}
				}
				Notification::State(state) => {
					session.sink.send(translator.on_state(state));
				}
				Notification::Event(event) => {
					if let Some(event) = translator.on_event(&event, || session.buffering()) {
						session.sink.send(event);
					}
				}
			}
		}
	}

	pub fn player(&self) -> Option<&P> {
		self.player.as_ref()
	}

	/// Record and apply a property.
	pub fn set_property(&self, key: &str, value: &str) -> crate::Result<()> {
		let mut config = self.config.lock();
		if config.media.is_some() {
			return Err(crate::Error::Opened);
		}

		config.properties.insert(key, value);
		if let Some(player) = &self.player {
			player.set_property(key, value);
		}

		Ok(())
	}

	pub fn properties(&self) -> Properties {
		self.config.lock().properties.clone()
	}

	/// Set the media and wait for the engine to prepare it.
	pub async fn open(&self, url: &str, flags: SeekFlags) -> Result<(), i64> {
		self.config.lock().media = Some(url.to_string());

		let player = self.player.as_ref().ok_or(NO_PLAYER)?;
		player.set_media(url);

		match player.prepare(Duration::ZERO, flags).await {
			code if code < 0 => Err(code),
			_ => Ok(()),
		}
	}

	pub fn media(&self) -> Option<String> {
		self.config.lock().media.clone()
	}

	/// Bind a render surface, returning its raw id.
	pub async fn bind(&self, options: &SurfaceOptions) -> Result<i64, i64> {
		let player = self.player.as_ref().ok_or(NO_PLAYER)?;

		match player.update_surface(options).await {
			code if code < 0 => Err(code),
			id => Ok(id),
		}
	}

	pub fn set_key(&self, key: Key) {
		self.config.lock().key = Some(key);
	}

	pub fn key(&self) -> Option<Key> {
		self.config.lock().key
	}

	/// The current position and how much is buffered past it.
	pub fn buffering(&self) -> (Duration, Duration) {
		match &self.player {
			Some(player) => (player.position(), player.buffered()),
			None => Default::default(),
		}
	}

	pub fn publish(&self, event: Event) -> bool {
		self.sink.send(event)
	}

	/// Stop translating and replace pending events with a single creation error.
	pub fn fail(&self, kind: ErrorKind, code: i64) -> CreateError {
		self.closed.lock().take();

		let message = match kind {
			ErrorKind::MediaOpen => format!("failed to open {}: {code}", self.media().unwrap_or_default()),
			ErrorKind::VideoSize => format!("failed to bind a render surface: {code}"),
		};
		self.sink.fail(Event::Error { kind, message });

		CreateError {
			token: self.token,
			kind,
			code,
		}
	}

	pub fn subscribe(&self) -> Option<EventStream> {
		self.sink.subscribe().map(EventStream::new)
	}

	/// Stop producing events; the native player is released once the last reference is dropped.
	pub fn close(&self) {
		self.closed.lock().take();
		self.sink.close();
	}

	pub fn is_closed(&self) -> bool {
		self.sink.is_closed()
	}
}
