use std::str::Utf8Error;

/// Errors returned across the C boundary, as negative codes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	#[error("panic")]
	Panic,

	#[error("invalid pointer")]
	InvalidPointer,

	#[error("invalid id")]
	InvalidId,

	#[error("invalid code")]
	InvalidCode,

	#[error("utf8 error: {0}")]
	Utf8(#[from] Utf8Error),

	#[error("not registered")]
	NotRegistered,

	#[error("unknown log level: {0}")]
	LogLevel(String),

	#[error("runtime unavailable")]
	Runtime,

	#[error(transparent)]
	Bridge(#[from] vidbridge::Error),
}

impl Error {
	pub fn code(&self) -> i32 {
		match self {
			Self::Panic => -1,
			// Shares the library's codes, -2 through -6.
			Self::Bridge(err) => err.code(),
			Self::InvalidPointer => -10,
			Self::InvalidId => -11,
			Self::InvalidCode => -12,
			Self::Utf8(_) => -13,
			Self::NotRegistered => -14,
			Self::LogLevel(_) => -15,
			Self::Runtime => -16,
		}
	}
}
