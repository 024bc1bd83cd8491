pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{AppState, CommandError};
pub use application::quest_store::{QuestStore, StoreError};
pub use application::session::{IdentityProvider, SessionGate};
pub use domain::clock::{ReferenceClock, TimeTracker};
pub use domain::models::{Quest, QuestCategory, QuestIcon, QuestInput, QuestPatch, QuestStats};
pub use infrastructure::error::InfraError;

use application::bootstrap::bootstrap_workspace;
use infrastructure::logging::init_tracing;
use std::path::PathBuf;

/// Prepares the workspace, installs command logging and opens the quest log.
/// Uses the current directory when no root is given.
pub fn initialize(root: Option<PathBuf>) -> Result<AppState, InfraError> {
    let workspace_root = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let bootstrap = bootstrap_workspace(&workspace_root)?;
    if !init_tracing(&bootstrap.logs_dir)? {
        tracing::debug!("tracing subscriber already installed");
    }
    let state = AppState::from_bootstrap(bootstrap)?;
    state.log_info(
        "initialize",
        &format!("workspace ready database={}", state.database_path().display()),
    );
    Ok(state)
}
