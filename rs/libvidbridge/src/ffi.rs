use std::ffi::{CStr, c_char, c_void};

use vidbridge::Key;

use crate::Error;

/// A C callback plus its opaque context.
pub struct Callback<F: Copy> {
	user_data: *mut c_void,
	callback: Option<F>,
}

impl<F: Copy> Callback<F> {
	/// # Safety
	///
	/// The caller must ensure that user_data stays valid until the callback is dropped.
	pub unsafe fn new(user_data: *mut c_void, callback: Option<F>) -> Self {
		Self { user_data, callback }
	}

	/// Returns the callback and context, if a callback was provided.
	// &mut avoids the need for Sync
	pub fn get(&mut self) -> Option<(F, *mut c_void)> {
		self.callback.map(|callback| (callback, self.user_data))
	}
}

// SAFETY: The callback is moved into a tokio task and invoked from the runtime thread.
// The C side MUST guarantee that user_data can be used from that thread.
unsafe impl<F: Copy> Send for Callback<F> {}

/// Called with a status or id; negative on error.
pub type OnStatus = extern "C" fn(user_data: *mut c_void, code: i64);

impl Callback<OnStatus> {
	pub fn call<C: ReturnCode>(&mut self, ret: C) {
		if let Some((on_status, user_data)) = self.get() {
			on_status(user_data, ret.code().into());
		}
	}

	/// Like [Self::call], but with a 64-bit payload.
	pub fn call_raw(&mut self, raw: i64) {
		if let Some((on_status, user_data)) = self.get() {
			on_status(user_data, raw);
		}
	}
}

pub fn return_code<C: ReturnCode, F: FnOnce() -> C>(f: F) -> i32 {
	match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
		Ok(ret) => ret.code(),
		Err(_) => Error::Panic.code(),
	}
}

pub trait ReturnCode {
	fn code(&self) -> i32;
}

impl ReturnCode for () {
	fn code(&self) -> i32 {
		0
	}
}

impl ReturnCode for i32 {
	fn code(&self) -> i32 {
		*self
	}
}

impl ReturnCode for usize {
	fn code(&self) -> i32 {
		i32::try_from(*self).unwrap_or_else(|_| Error::InvalidCode.code())
	}
}

impl ReturnCode for Error {
	fn code(&self) -> i32 {
		Error::code(self)
	}
}

impl<C: ReturnCode> ReturnCode for Result<C, Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(ret) => ret.code(),
			Err(e) => e.code(),
		}
	}
}

/// Parse a session id, where negative values identify failed sessions.
pub fn parse_key(id: i64) -> Result<Key, Error> {
	Key::from_raw(id).ok_or(Error::InvalidId)
}

/// # Safety
///
/// The caller must ensure that cstr is valid for 'a.
pub unsafe fn parse_str<'a>(cstr: *const c_char) -> Result<&'a str, Error> {
	if cstr.is_null() {
		return Ok("");
	}

	let string = unsafe { CStr::from_ptr(cstr) };
	Ok(string.to_str()?)
}

/// Like [parse_str], but null is an error.
///
/// # Safety
///
/// The caller must ensure that cstr is valid for 'a.
pub unsafe fn parse_required<'a>(cstr: *const c_char) -> Result<&'a str, Error> {
	if cstr.is_null() {
		return Err(Error::InvalidPointer);
	}

	unsafe { parse_str(cstr) }
}

/// # Safety
///
/// The caller must ensure that data is valid for 'a.
pub unsafe fn parse_slice<'a, T>(data: *const T, len: usize) -> Result<&'a [T], Error> {
	if data.is_null() {
		if len == 0 {
			return Ok(&[]);
		}

		return Err(Error::InvalidPointer);
	}

	let data = unsafe { std::slice::from_raw_parts(data, len) };
	Ok(data)
}
