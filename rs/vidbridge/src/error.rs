use std::fmt;

use crate::FailureToken;

/// A list of possible errors returned by the bridge.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// No session is registered under the given key.
	#[error("not found")]
	NotFound,

	/// The event stream was already handed out.
	#[error("already subscribed")]
	AlreadySubscribed,

	/// The registration excluded the current platform.
	#[error("platform excluded")]
	Excluded,

	/// Properties can't change once the media is opened.
	#[error("media already opened")]
	Opened,

	#[error("invalid options: {0}")]
	Options(#[from] serde_json::Error),
}

impl Error {
	/// A stable negative code, used across the C boundary.
	pub fn code(&self) -> i32 {
		-match self {
			Self::NotFound => 2,
			Self::AlreadySubscribed => 3,
			Self::Excluded => 4,
			Self::Opened => 5,
			Self::Options(_) => 6,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// The creation stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// The engine couldn't open or prepare the media.
	MediaOpen,

	/// The engine couldn't negotiate a video size or bind a render surface.
	VideoSize,
}

impl ErrorKind {
	/// The error code reported on the event stream.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::MediaOpen => "media open error",
			Self::VideoSize => "video size error",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A session failed to be created.
///
/// The failed session stays registered under [CreateError::token] so the one terminal
/// [crate::Event::Error] can still be read from its event stream. It's disposed once that
/// event was read, or explicitly with [crate::Bridge::dispose].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: native code {code}")]
pub struct CreateError {
	pub token: FailureToken,
	pub kind: ErrorKind,
	pub code: i64,
}
