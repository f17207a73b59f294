use std::path::Path;

use url::Url;

/// Protocols the engine may open, including those reached through nested demuxers.
pub const PROTOCOL_WHITELIST: &str = "file,rtmp,http,https,tls,rtp,tcp,udp,crypto,httpproxy,data,concatf,concat,subfile";

/// Where the media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
	/// A bundled asset, optionally from another package.
	Asset { name: String, package: Option<String> },

	/// Any URL the engine understands (http, rtsp, file...).
	Network(String),

	/// A local file.
	File(String),

	/// An Android content URI.
	ContentUri(String),
}

/// Describes the media a session should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
	pub location: Location,

	/// Extra HTTP headers, in order.
	pub headers: Vec<(String, String)>,

	/// A hint for the container format, ex. `hls` or `dash`.
	pub format: Option<String>,
}

impl Source {
	pub fn new(location: Location) -> Self {
		Self {
			location,
			headers: Vec::new(),
			format: None,
		}
	}

	pub fn network(url: impl Into<String>) -> Self {
		Self::new(Location::Network(url.into()))
	}

	pub fn asset(name: impl Into<String>, package: Option<String>) -> Self {
		Self::new(Location::Asset {
			name: name.into(),
			package,
		})
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Serialize the headers into one multi-line property value, or [None] if there are none.
	pub fn header_property(&self) -> Option<String> {
		if self.headers.is_empty() {
			return None;
		}

		Some(
			self.headers
				.iter()
				.map(|(name, value)| format!("{name}: {value}\r\n"))
				.collect(),
		)
	}

	/// The URI handed to the engine.
	pub fn resolve(&self, assets: &Path) -> String {
		match &self.location {
			Location::Asset { name, package } => {
				asset_path(assets, name, package.as_deref()).to_string_lossy().into_owned()
			}
			Location::File(path) => match Url::parse(path) {
				// Engines want plain paths for local files.
				Ok(url) if url.scheme() == "file" => url
					.to_file_path()
					.map(|path| path.to_string_lossy().into_owned())
					.unwrap_or_else(|_| path.clone()),
				_ => path.clone(),
			},
			Location::Network(url) | Location::ContentUri(url) => url.clone(),
		}
	}
}

/// The path of a bundled asset.
///
/// Assets from other packages live under `packages/<package>/`.
pub fn asset_path(assets: &Path, name: &str, package: Option<&str>) -> std::path::PathBuf {
	match package {
		Some(package) => assets.join("packages").join(package).join(name),
		None => assets.join(name),
	}
}
