use crate::infrastructure::error::InfraError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "commands.log";
const LOG_FILTER_ENV: &str = "QUESTLOG_LOG";

/// Installs a JSON-lines subscriber appending to `logs_dir/commands.log`.
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(logs_dir: &Path) -> Result<bool, InfraError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE_NAME))?;
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_target(false)
        .try_init()
        .is_ok();
    Ok(installed)
}
