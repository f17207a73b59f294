//! Bridges a callback driven media engine to an event stream playback API.
//!
//! The engine reports level-triggered status snapshots from its own threads.
//! Each [Bridge] session turns those into an ordered stream of discrete [Event]s, and exposes
//! the usual transport controls (play, pause, seek, volume, rate) keyed by render surface.
//!
//! - [Engine] and [Player] are the seam to the native engine.
//! - [Registrar] installs a [Bridge] as the host's active [PlayerPlatform].
//! - [Log] configures logging for hosts without their own subscriber.

mod bridge;
pub mod decoder;
mod engine;
mod error;
mod event;
mod global;
mod id;
mod log;
mod options;
mod platform;
mod registrar;
mod registry;
mod session;
pub mod source;
mod swap;

#[cfg(test)]
mod mock;

pub use bridge::*;
pub use engine::*;
pub use error::*;
pub use event::{BUFFERING_CATEGORY, Event, EventStream, Translator};
pub use global::SUBTITLE_FONT_OPTION;
pub use id::*;
pub use log::*;
pub use options::*;
pub use platform::*;
pub use registrar::*;
pub use session::Properties;
pub use source::{Location, Source};
pub use swap::*;

pub(crate) use event::EventSink;
pub(crate) use global::Global;
pub(crate) use registry::Registry;
pub(crate) use session::Session;
