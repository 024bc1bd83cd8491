use crate::infrastructure::config::{
    ensure_default_configs, load_app_settings, load_auth_settings, AppSettings, AuthSettings,
    StorageBackend,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE_NAME: &str = "questlog.sqlite";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
    pub settings: AppSettings,
    pub auth: AuthSettings,
}

/// Lays out `config/`, `state/` and `logs/` under the workspace root, writes
/// missing config files and prepares the quest database.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join(DATABASE_FILE_NAME);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let settings = load_app_settings(&config_dir)?;
    let auth = load_auth_settings(&config_dir)?;
    if settings.storage == StorageBackend::Sqlite {
        initialize_database(&database_path)?;
    }

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
        settings,
        auth,
    })
}
