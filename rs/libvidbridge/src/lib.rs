//! C bindings for [vidbridge].
//!
//! The engine is provided as a table of function pointers ([VbEngine]) and reports back with
//! the `vb_listener_*`, [vb_complete] and [vb_engine_log] functions. Everything else is
//! called by the host: [vb_register], [vb_create], [vb_events] and the transport controls.
//!
//! Asynchronous work runs on a dedicated runtime thread; callbacks are invoked from it.

mod api;
mod error;
mod ffi;
mod native;
mod runtime;
mod state;

pub use api::*;
pub use error::*;
pub use ffi::OnStatus;
pub use native::{CANCELLED, NativeEngine, NativePlayer, VbEngine, VbMediaInfo};
pub use state::{
	OnEvent, VB_EVENT_BUFFERING_END, VB_EVENT_BUFFERING_START, VB_EVENT_BUFFERING_UPDATE, VB_EVENT_CLOSED,
	VB_EVENT_ERROR, VB_EVENT_INITIALIZED, VB_EVENT_IS_PLAYING_CHANGED, VbEvent, VbSource,
};

pub(crate) use state::State;
