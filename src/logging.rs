use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "invlens=info";
const LOG_FILE_PREFIX: &str = "invlens.log";

/// Default log directory: `<data dir>/invlens/logs`
pub fn default_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|d| d.join("invlens").join("logs"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}

/// Install the global subscriber, writing to a daily rolling file in `dir`.
///
/// `RUST_LOG` overrides the default filter. Keep the returned guard alive
/// for the life of the process or buffered lines are lost.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
