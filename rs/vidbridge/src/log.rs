use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Logging configuration for hosts without their own subscriber.
///
/// Engine logs are forwarded under the `vidbridge::engine` target, and the engine's own
/// verbosity follows the level configured here.
#[derive(clap::Args, Clone, Debug)]
#[non_exhaustive]
pub struct Log {
	/// The default level; `RUST_LOG` takes precedence.
	#[arg(id = "log-level", long = "log-level", default_value = "info", env = "VIDBRIDGE_LOG_LEVEL")]
	pub level: Level,
}

impl Default for Log {
	fn default() -> Self {
		Self { level: Level::INFO }
	}
}

impl Log {
	pub fn new(level: Level) -> Self {
		Self { level }
	}

	pub fn level(&self) -> LevelFilter {
		LevelFilter::from_level(self.level)
	}

	/// Install a global subscriber; does nothing if one is already installed.
	pub fn init(&self) {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level().into())
			.from_env_lossy();

		let res = tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_writer(std::io::stderr)
			.try_init();

		if res.is_err() {
			tracing::debug!("subscriber already installed");
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use clap::Parser;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		log: Log,
	}

	#[test]
	fn parse() {
		let cli = Cli::parse_from(["test", "--log-level", "debug"]);
		assert_eq!(cli.log.level(), LevelFilter::DEBUG);
	}
}
