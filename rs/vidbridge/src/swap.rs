//! Installing ourselves as the active player implementation, and backing out again.

use std::{any::Any, marker::PhantomData, sync::Arc};

use parking_lot::{Mutex, RwLock};

/// A player implementation the host can route playback to.
pub trait PlayerPlatform: Send + Sync + 'static {
	/// A human readable name, for logging.
	fn name(&self) -> &str;

	fn as_any(&self) -> &dyn Any;
}

/// The host's single active player implementation.
pub struct InstanceSlot {
	active: RwLock<Arc<dyn PlayerPlatform>>,
}

impl InstanceSlot {
	pub fn new(initial: Arc<dyn PlayerPlatform>) -> Self {
		Self {
			active: RwLock::new(initial),
		}
	}

	pub fn get(&self) -> Arc<dyn PlayerPlatform> {
		self.active.read().clone()
	}

	/// Replace the active implementation, returning the previous one.
	pub fn set(&self, platform: Arc<dyn PlayerPlatform>) -> Arc<dyn PlayerPlatform> {
		tracing::debug!(name = platform.name(), "installing player implementation");
		std::mem::replace(&mut *self.active.write(), platform)
	}
}

/// Remembers what was active before `T` installed itself, so it can be put back.
pub struct SwapGuard<T: PlayerPlatform> {
	// Only the very first install is recorded.
	previous: Mutex<Option<Arc<dyn PlayerPlatform>>>,
	_owner: PhantomData<fn() -> T>,
}

impl<T: PlayerPlatform> Default for SwapGuard<T> {
	fn default() -> Self {
		Self {
			previous: Default::default(),
			_owner: PhantomData,
		}
	}
}

impl<T: PlayerPlatform> SwapGuard<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Install `ours`, saving the active implementation if nothing was saved yet.
	pub fn install(&self, slot: &InstanceSlot, ours: Arc<T>) {
		let mut previous = self.previous.lock();
		let old = slot.set(ours);

		// Never save one of our own; that would make restoring a no-op.
		if previous.is_none() && !Self::owns(&*old) {
			*previous = Some(old);
		}
	}

	/// Put the saved implementation back, but only if one of ours is still active.
	///
	/// Returns true if anything was restored.
	pub fn restore(&self, slot: &InstanceSlot) -> bool {
		let previous = self.previous.lock();
		let Some(previous) = previous.as_ref() else {
			return false;
		};

		if !Self::owns(&*slot.get()) {
			tracing::debug!("another player implementation is active, not restoring");
			return false;
		}

		slot.set(previous.clone());
		true
	}

	/// The implementation that was active before the first install.
	pub fn previous(&self) -> Option<Arc<dyn PlayerPlatform>> {
		self.previous.lock().clone()
	}

	pub fn owns(platform: &dyn PlayerPlatform) -> bool {
		platform.as_any().is::<T>()
	}
}
