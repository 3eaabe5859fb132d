use crate::application::engine::BlockEngine;
use crate::infrastructure::counted_blocks_repository::SqliteCountedBlocksRepository;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_repository::SqliteSettingsRepository;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
}

/// Create the state directory under `workspace_root` and initialize the
/// backing database.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = workspace_root.join("state");
    fs::create_dir_all(&state_dir)?;

    let database_path = state_dir.join("sordino.sqlite");
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
    })
}

/// Bootstrap a workspace and return an engine backed by its database.
pub fn open_engine(
    workspace_root: &Path,
) -> Result<BlockEngine<SqliteSettingsRepository, SqliteCountedBlocksRepository>, InfraError> {
    let bootstrap = bootstrap_workspace(workspace_root)?;
    Ok(BlockEngine::new(
        Arc::new(SqliteSettingsRepository::new(&bootstrap.database_path)),
        Arc::new(SqliteCountedBlocksRepository::new(&bootstrap.database_path)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_state_dir_and_database() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap workspace");
        assert!(result.database_path.exists());
        // Re-running against an existing workspace is harmless.
        bootstrap_workspace(dir.path()).expect("second bootstrap");
    }

    #[tokio::test]
    async fn open_engine_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("create temp dir");
        {
            let engine = open_engine(dir.path()).expect("open engine");
            engine
                .toggle_manual_override(crate::domain::models::ManualOverride::On)
                .await;
        }
        let reopened = open_engine(dir.path()).expect("reopen engine");
        let settings = reopened.get_settings().await;
        assert_eq!(
            settings.block_state.manual_override,
            crate::domain::models::ManualOverride::On
        );
    }
}
