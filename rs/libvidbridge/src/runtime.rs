//! The runtime driving sessions, their translator tasks, and the work spawned by `vb_*` calls.

use std::{io, sync::LazyLock};

use tokio::runtime::{EnterGuard, Handle};

use crate::Error;

// A single thread, so controls spawned by C callers run in the order they were made.
static RUNTIME: LazyLock<io::Result<Handle>> = LazyLock::new(start);

fn start() -> io::Result<Handle> {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
	let handle = runtime.handle().clone();

	std::thread::Builder::new()
		.name("vidbridge".into())
		.spawn(move || runtime.block_on(std::future::pending::<()>()))?;

	Ok(handle)
}

/// Enter the runtime from a caller's thread, starting it on first use.
pub fn enter() -> Result<EnterGuard<'static>, Error> {
	match &*RUNTIME {
		Ok(handle) => Ok(handle.enter()),
		Err(err) => {
			tracing::error!(%err, "failed to start the runtime");
			Err(Error::Runtime)
		}
	}
}
