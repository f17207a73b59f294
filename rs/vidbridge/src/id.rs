use std::fmt;

/// The render surface a usable session is bound to.
///
/// Always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
	/// Returns [None] for the negative codes used by the engine to signal failure.
	pub fn new(raw: i64) -> Option<Self> {
		u32::try_from(raw).ok().map(Self)
	}

	pub const fn get(self) -> u32 {
		self.0
	}
}

impl fmt::Display for SurfaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifies a session that failed during creation.
///
/// Derived from the session's own sequence number, so it never collides with another session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FailureToken(u32);

impl FailureToken {
	pub(crate) const fn new(sequence: u32) -> Self {
		Self(sequence)
	}

	pub const fn get(self) -> u32 {
		self.0
	}
}

impl fmt::Display for FailureToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "failed#{}", self.0)
	}
}

/// The key a session is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
	Surface(SurfaceId),
	Failed(FailureToken),
}

impl Key {
	/// Encode as a signed integer: surfaces are `>= 0`, failures are `< 0`.
	///
	/// Only needed when talking to integer-keyed hosts.
	pub fn to_raw(self) -> i64 {
		match self {
			Self::Surface(id) => id.0 as i64,
			Self::Failed(token) => -(token.0 as i64),
		}
	}

	/// The inverse of [Key::to_raw].
	pub fn from_raw(raw: i64) -> Option<Self> {
		if raw >= 0 {
			return SurfaceId::new(raw).map(Self::Surface);
		}

		let token = raw.checked_neg()?;
		u32::try_from(token).ok().map(|token| Self::Failed(FailureToken(token)))
	}
}

impl From<SurfaceId> for Key {
	fn from(id: SurfaceId) -> Self {
		Self::Surface(id)
	}
}

impl From<FailureToken> for Key {
	fn from(token: FailureToken) -> Self {
		Self::Failed(token)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Surface(id) => id.fmt(f),
			Self::Failed(token) => token.fmt(f),
		}
	}
}
