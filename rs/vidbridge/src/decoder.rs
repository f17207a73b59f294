//! Which video decoder backends to try, and in which order.

use crate::Platform;

/// The software fallback, available everywhere.
pub const SOFTWARE: &str = "FFmpeg";

/// Preferred decoders per platform, hardware accelerated first.
const TABLE: &[(Platform, &[&str])] = &[
	(Platform::Windows, &["MFT:d3d=11", "D3D11", "DXVA", "CUDA", SOFTWARE]),
	(Platform::MacOs, &["VT", SOFTWARE]),
	(Platform::Ios, &["VT", SOFTWARE]),
	(Platform::Linux, &["VAAPI", "CUDA", "VDPAU", SOFTWARE]),
	(Platform::Android, &["AMediaCodec", SOFTWARE]),
];

/// Platforms whose emulators advertise hardware decoding that doesn't work.
const BROKEN_ON_EMULATOR: &[Platform] = &[Platform::Android];

/// The default decoders for a platform, or empty to use the engine default.
pub fn defaults(platform: Platform) -> &'static [&'static str] {
	TABLE
		.iter()
		.find(|(p, _)| *p == platform)
		.map(|(_, decoders)| *decoders)
		.unwrap_or_default()
}

/// Resolve the decoder order for new sessions.
///
/// An explicit list is used verbatim. Otherwise the platform defaults are used, without the
/// hardware decoders when running on an emulator that can't handle them.
pub fn resolve(platform: Platform, emulator: bool, explicit: Option<&[String]>) -> Vec<String> {
	if let Some(explicit) = explicit {
		return explicit.to_vec();
	}

	let software_only = emulator && BROKEN_ON_EMULATOR.contains(&platform);

	defaults(platform)
		.iter()
		.filter(|name| !software_only || **name == SOFTWARE)
		.map(|name| name.to_string())
		.collect()
}
