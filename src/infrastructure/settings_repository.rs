use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Store for the single persisted settings document.
///
/// `load` returns the raw JSON document as last saved, or `None` when no
/// document has ever been written. `subscribe` yields a receiver that is
/// notified after every successful `save`, so other surfaces can re-read
/// immediately instead of waiting for their own poll interval.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> Result<Option<serde_json::Value>, InfraError>;
    async fn save(&self, document: &serde_json::Value) -> Result<(), InfraError>;
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

#[derive(Debug)]
pub struct SqliteSettingsRepository {
    db_path: PathBuf,
    changes: broadcast::Sender<()>,
}

impl SqliteSettingsRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            changes,
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> Result<Option<serde_json::Value>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT document FROM settings_document WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), InfraError> {
        let raw = serde_json::to_string(document)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO settings_document (id, document)
             VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            params![raw],
        )?;
        let _ = self.changes.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

#[derive(Debug)]
pub struct InMemorySettingsRepository {
    document: Mutex<Option<serde_json::Value>>,
    changes: broadcast::Sender<()>,
}

impl Default for InMemorySettingsRepository {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            document: Mutex::new(None),
            changes,
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Option<serde_json::Value>, InfraError> {
        let document = self
            .document
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("settings lock poisoned: {error}")))?;
        Ok(document.clone())
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), InfraError> {
        let mut stored = self
            .document
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("settings lock poisoned: {error}")))?;
        *stored = Some(document.clone());
        drop(stored);
        let _ = self.changes.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}
