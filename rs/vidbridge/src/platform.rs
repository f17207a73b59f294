use std::{fmt, path::PathBuf, str::FromStr};

/// An operating system the bridge can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Windows,
	MacOs,
	Linux,
	Android,
	Ios,
	Other,
}

impl Platform {
	/// The platform this was compiled for.
	pub const fn current() -> Self {
		if cfg!(target_os = "windows") {
			Self::Windows
		} else if cfg!(target_os = "macos") {
			Self::MacOs
		} else if cfg!(target_os = "android") {
			Self::Android
		} else if cfg!(target_os = "ios") {
			Self::Ios
		} else if cfg!(target_os = "linux") {
			Self::Linux
		} else {
			Self::Other
		}
	}

	/// The name used in registration allow-lists.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Windows => "windows",
			Self::MacOs => "macos",
			Self::Linux => "linux",
			Self::Android => "android",
			Self::Ios => "ios",
			Self::Other => "other",
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(String);

impl FromStr for Platform {
	type Err = UnknownPlatform;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"windows" => Self::Windows,
			"macos" => Self::MacOs,
			"linux" => Self::Linux,
			"android" => Self::Android,
			"ios" => Self::Ios,
			_ => return Err(UnknownPlatform(s.to_string())),
		})
	}
}

/// What the embedding host knows about where it's running.
#[derive(Debug, Clone)]
pub struct Host {
	pub platform: Platform,

	/// Running on an emulator, where hardware decoding may be broken.
	pub emulator: bool,

	/// The directory bundled assets are resolved against.
	pub assets: PathBuf,
}

impl Default for Host {
	fn default() -> Self {
		Self {
			platform: Platform::current(),
			emulator: false,
			assets: default_assets(),
		}
	}
}

// Next to the executable, the same place desktop embedders bundle their assets.
fn default_assets() -> PathBuf {
	let dir = std::env::current_exe()
		.ok()
		.and_then(|exe| exe.parent().map(PathBuf::from))
		.unwrap_or_default();

	match Platform::current() {
		Platform::MacOs => dir.join("../Frameworks/App.framework/Resources/flutter_assets"),
		_ => dir.join("data").join("flutter_assets"),
	}
}
