use std::sync::Arc;

use crate::{Bridge, Engine, Global, Host, InstanceSlot, Options, SwapGuard};

/// The process-wide registration entry point.
///
/// Every registered [Bridge] shares the engine and its one-time configuration.
pub struct Registrar<E: Engine> {
	engine: Arc<E>,
	global: Arc<Global>,
	guard: SwapGuard<Bridge<E>>,
	host: Host,
}

impl<E: Engine> Registrar<E> {
	pub fn new(engine: E, host: Host) -> Self {
		Self {
			engine: Arc::new(engine),
			global: Default::default(),
			guard: SwapGuard::new(),
			host,
		}
	}

	pub fn host(&self) -> &Host {
		&self.host
	}

	/// Install a new [Bridge] as the active implementation.
	///
	/// Returns [None] if the options exclude this platform, putting back whatever was active
	/// before us if we are still in control.
	pub fn register(&self, slot: &InstanceSlot, options: Options) -> Option<Arc<Bridge<E>>> {
		let platform = self.host.platform;

		if !options.includes(platform) {
			let restored = self.guard.restore(slot);
			tracing::info!(%platform, restored, "platform excluded, not registering");
			return None;
		}

		// The engine is configured lazily, on the first session.
		let bridge = Arc::new(Bridge::new(
			self.engine.clone(),
			self.global.clone(),
			options,
			self.host.clone(),
		));
		self.guard.install(slot, bridge.clone());

		tracing::info!(%platform, "registered");
		Some(bridge)
	}

	/// Parse the payload and [Self::register].
	pub fn register_json(&self, slot: &InstanceSlot, options: &str) -> crate::Result<Option<Arc<Bridge<E>>>> {
		let options = Options::from_json(options)?;
		Ok(self.register(slot, options))
	}

	pub fn is_initialized(&self) -> bool {
		self.global.is_initialized()
	}
}

#[cfg(test)]
mod test {
	use std::any::Any;

	use super::*;
	use crate::{
		OptionValue, Platform, PlayerPlatform, Source,
		mock::{Call, MockEngine},
	};

	struct Native;

	impl PlayerPlatform for Native {
		fn name(&self) -> &str {
			"native"
		}

		fn as_any(&self) -> &dyn Any {
			self
		}
	}

	fn registrar(engine: &MockEngine) -> Registrar<MockEngine> {
		Registrar::new(
			engine.clone(),
			Host {
				platform: Platform::Linux,
				emulator: false,
				assets: "/assets".into(),
			},
		)
	}

	#[tokio::test]
	async fn excluded_platform_restores() {
		let engine = MockEngine::default();
		let registrar = registrar(&engine);
		let slot = InstanceSlot::new(Arc::new(Native));

		let bridge = registrar.register_json(&slot, "{}").unwrap();
		assert!(bridge.is_some());
		assert_eq!(slot.get().name(), "vidbridge");

		let excluded = registrar
			.register_json(&slot, r#"{ "platforms": ["windows", "android"] }"#)
			.unwrap();
		assert!(excluded.is_none());
		assert_eq!(slot.get().name(), "native");

		// Nothing was configured without a session.
		assert!(!registrar.is_initialized());
		assert!(engine.calls().is_empty());
	}

	#[tokio::test]
	async fn included_platform() {
		let engine = MockEngine::default();
		let registrar = registrar(&engine);
		let slot = InstanceSlot::new(Arc::new(Native));

		let bridge = registrar.register_json(&slot, r#"{ "platforms": ["linux"] }"#).unwrap();
		assert!(bridge.is_some());
		assert_eq!(slot.get().name(), "vidbridge");
	}

	#[tokio::test]
	async fn configured_once() {
		let engine = MockEngine::default();
		let registrar = registrar(&engine);
		let slot = InstanceSlot::new(Arc::new(Native));

		let first = registrar.register_json(&slot, r#"{ "global": { "a": 1 } }"#).unwrap().unwrap();
		let second = registrar.register_json(&slot, r#"{ "global": { "b": 2 } }"#).unwrap().unwrap();

		first.create(&Source::network("a")).await.unwrap();
		second.create(&Source::network("b")).await.unwrap();
		assert!(registrar.is_initialized());

		let calls = engine.calls();
		assert_eq!(calls.iter().filter(|call| matches!(call, Call::SetLogHandler)).count(), 1);
		assert!(calls.contains(&Call::GlobalOption("a".into(), OptionValue::Int(1))));
		assert!(!calls.iter().any(|call| matches!(call, Call::GlobalOption(key, _) if key == "b")));

		// Both bridges share the engine, but not their sessions.
		assert_eq!(first.len(), 1);
		assert_eq!(second.len(), 1);
	}
}
