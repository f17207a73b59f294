use std::sync::{Once, OnceLock};

use tracing::level_filters::LevelFilter;

use crate::{Engine, Host, LogLevel, OptionValue, Options, Platform, decoder, source};

/// The engine option naming the subtitle font.
pub const SUBTITLE_FONT_OPTION: &str = "subtitle.fonts.file";

/// Process-wide engine state, initialized exactly once.
pub(crate) struct Global {
	init: Once,
	decoders: OnceLock<Vec<String>>,
}

impl Default for Global {
	fn default() -> Self {
		Self {
			init: Once::new(),
			decoders: OnceLock::new(),
		}
	}
}

impl Global {
	/// Configure the engine the first time this is called; later calls do nothing.
	pub fn ensure_initialized<E: Engine>(&self, engine: &E, options: &Options, host: &Host) {
		self.init.call_once(|| {
			tracing::debug!(platform = %host.platform, "initializing engine");

			engine.set_log_handler(Some(Box::new(forward_log)));
			engine.set_log_level(baseline_level());

			if let Some((key, value)) = sync_option(host.platform) {
				engine.set_global_option(key, &value);
			}

			let font = source::asset_path(&host.assets, options.subtitle_font(), None);
			let font = OptionValue::String(font.to_string_lossy().into_owned());
			engine.set_global_option(SUBTITLE_FONT_OPTION, &font);

			// Later duplicates win, the engine just sees them in order.
			for (key, value) in options.global_options() {
				engine.set_global_option(key, &value);
			}

			let decoders = decoder::resolve(host.platform, host.emulator, options.decoders.as_deref());
			tracing::debug!(?decoders, "resolved video decoders");
			let _ = self.decoders.set(decoders);
		});
	}

	/// The video decoder order for new sessions, empty until initialized.
	pub fn decoders(&self) -> &[String] {
		self.decoders.get().map(Vec::as_slice).unwrap_or_default()
	}

	pub fn is_initialized(&self) -> bool {
		self.init.is_completed()
	}
}

// Match the engine's verbosity to whatever the host subscriber will keep.
fn baseline_level() -> LogLevel {
	let current = LevelFilter::current();
	if current == LevelFilter::OFF {
		LogLevel::Off
	} else if current == LevelFilter::ERROR {
		LogLevel::Error
	} else if current == LevelFilter::WARN {
		LogLevel::Warning
	} else if current == LevelFilter::INFO {
		LogLevel::Info
	} else if current == LevelFilter::DEBUG {
		LogLevel::Debug
	} else {
		LogLevel::All
	}
}

/// The render synchronization mode for the platform's default render backend.
fn sync_option(platform: Platform) -> Option<(&'static str, OptionValue)> {
	match platform {
		Platform::Windows => Some(("d3d11.sync.cpu", OptionValue::Int(1))),
		_ => None,
	}
}

/// Forward an engine log line to `tracing`, dropping unknown levels.
pub(crate) fn forward_log(level: u32, message: &str) {
	let Ok(level) = LogLevel::try_from(level) else {
		return;
	};

	let message = message.trim_end();
	match level {
		LogLevel::Error => tracing::error!(target: "vidbridge::engine", "{message}"),
		LogLevel::Warning => tracing::warn!(target: "vidbridge::engine", "{message}"),
		LogLevel::Info => tracing::info!(target: "vidbridge::engine", "{message}"),
		LogLevel::Debug => tracing::debug!(target: "vidbridge::engine", "{message}"),
		LogLevel::All => tracing::trace!(target: "vidbridge::engine", "{message}"),
		LogLevel::Off => {}
	}
}
