use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{OptionValue, Platform, SurfaceOptions};

/// The asset used as the default subtitle font.
pub const DEFAULT_SUBTITLE_FONT: &str = "packages/vidbridge/assets/subfont.ttf";

/// The registration payload.
///
/// Values are not validated: a value of the wrong type is ignored, and unknown keys are skipped.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Options {
	/// Only activate on these platforms.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub platforms: Option<Vec<String>>,

	/// Trade buffering for latency; `1` shrinks probing and the minimum buffer, `2` also drops.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub low_latency: Option<i64>,

	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub max_width: Option<u32>,

	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub max_height: Option<u32>,

	/// Fit within the maximum size instead of cropping.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub fit_max_size: Option<bool>,

	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub tunnel: Option<bool>,

	/// Engine properties applied to every new session.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub player: Option<Map<String, Value>>,

	/// Process-wide engine options, applied once.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub global: Option<Map<String, Value>>,

	/// An explicit video decoder order, replacing the platform defaults.
	#[serde(
		rename = "video.decoders",
		deserialize_with = "lenient",
		skip_serializing_if = "Option::is_none"
	)]
	pub decoders: Option<Vec<String>>,

	/// The asset used as the subtitle font.
	#[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
	pub subtitle_font_file: Option<String>,
}

// Keep going with the rest of the payload when a single value has the wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
	D: Deserializer<'de>,
	T: DeserializeOwned,
{
	let value = Value::deserialize(deserializer)?;
	match serde_json::from_value(value) {
		Ok(value) => Ok(Some(value)),
		Err(err) => {
			tracing::debug!(%err, "ignoring option");
			Ok(None)
		}
	}
}

impl Options {
	/// Parse the payload, which must be a JSON object (or null).
	pub fn from_json(json: &str) -> crate::Result<Self> {
		match serde_json::from_str::<Value>(json)? {
			Value::Null => Ok(Self::default()),
			value => Ok(serde_json::from_value(value)?),
		}
	}

	/// Returns false if an allow-list is present and doesn't name the platform.
	pub fn includes(&self, platform: Platform) -> bool {
		match &self.platforms {
			Some(platforms) => platforms.iter().any(|name| name == platform.as_str()),
			None => true,
		}
	}

	pub fn surface(&self) -> SurfaceOptions {
		SurfaceOptions {
			max_width: self.max_width,
			max_height: self.max_height,
			fit_max_size: self.fit_max_size.unwrap_or_default(),
			tunnel: self.tunnel.unwrap_or_default(),
		}
	}

	/// Per-session engine properties, stringified.
	pub fn player_properties(&self) -> impl Iterator<Item = (&str, String)> {
		self.player
			.iter()
			.flatten()
			.map(|(key, value)| (key.as_str(), OptionValue::from_json(value).to_string()))
	}

	/// Process-wide engine options, in payload order.
	pub fn global_options(&self) -> impl Iterator<Item = (&str, OptionValue)> {
		self.global
			.iter()
			.flatten()
			.map(|(key, value)| (key.as_str(), OptionValue::from_json(value)))
	}

	pub fn subtitle_font(&self) -> &str {
		self.subtitle_font_file.as_deref().unwrap_or(DEFAULT_SUBTITLE_FONT)
	}
}
