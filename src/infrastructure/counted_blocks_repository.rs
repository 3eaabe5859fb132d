use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Hostnames already counted as blocked for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedBlocksSnapshot {
    pub date: String,
    pub sites: HashSet<String>,
}

impl CountedBlocksSnapshot {
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            sites: HashSet::new(),
        }
    }
}

/// Store for the counted-blocks ledger. Unlike the settings document this
/// is session-scoped state: it must survive a process restart within the
/// same day, and is discarded wholesale once the stored date goes stale.
#[async_trait]
pub trait CountedBlocksRepository: Send + Sync {
    async fn load(&self) -> Result<Option<CountedBlocksSnapshot>, InfraError>;
    async fn save(&self, snapshot: &CountedBlocksSnapshot) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCountedBlocksRepository {
    db_path: PathBuf,
}

impl SqliteCountedBlocksRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

#[async_trait]
impl CountedBlocksRepository for SqliteCountedBlocksRepository {
    async fn load(&self) -> Result<Option<CountedBlocksSnapshot>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String)> = connection
            .query_row(
                "SELECT date, sites FROM counted_blocks WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((date, sites_raw)) = row else {
            return Ok(None);
        };
        let sites: HashSet<String> = serde_json::from_str(&sites_raw)?;
        Ok(Some(CountedBlocksSnapshot { date, sites }))
    }

    async fn save(&self, snapshot: &CountedBlocksSnapshot) -> Result<(), InfraError> {
        let sites_raw = serde_json::to_string(&snapshot.sites)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO counted_blocks (id, date, sites)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               date = excluded.date,
               sites = excluded.sites",
            params![snapshot.date, sites_raw],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCountedBlocksRepository {
    state: Mutex<Option<CountedBlocksSnapshot>>,
}

#[async_trait]
impl CountedBlocksRepository for InMemoryCountedBlocksRepository {
    async fn load(&self) -> Result<Option<CountedBlocksSnapshot>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("ledger lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    async fn save(&self, snapshot: &CountedBlocksSnapshot) -> Result<(), InfraError> {
        let mut state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("ledger lock poisoned: {error}")))?;
        *state = Some(snapshot.clone());
        Ok(())
    }
}
