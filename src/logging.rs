use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive; drop it last.
pub struct LogGuard {
  _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Filter comes from GHUSERS_LOG when set. By default logs go to
/// `<data dir>/ghusers/ghusers.log` so they stay out of command output;
/// `verbose` sends them to stderr at debug level instead.
pub fn init(verbose: bool) -> Result<LogGuard> {
  let default_level = if verbose { "ghusers=debug" } else { "ghusers=info" };
  let filter =
    EnvFilter::try_from_env("GHUSERS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

  if verbose {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .try_init()
      .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;
    return Ok(LogGuard { _worker: None });
  }

  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &dir,
    "ghusers.log",
  ));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(LogGuard {
    _worker: Some(guard),
  })
}

fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("ghusers"))
}
