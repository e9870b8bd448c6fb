use crate::domain::models::RefreshState;
use crate::infrastructure::error::PersistError;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The retained-memory boundary. Purely a storage medium: the control
/// loop owns the state, this trait only parks it across deep sleep.
pub trait RefreshStateRepository: Send + Sync {
    /// `None` on first-ever boot. A corrupted store is an error the
    /// caller treats as first boot.
    fn restore(&self) -> Result<Option<RefreshState>, PersistError>;
    fn commit(&self, state: &RefreshState) -> Result<(), PersistError>;
}

/// Single-row SQLite store holding the JSON-serialized state. One
/// upsert per commit, so the cache is replaced atomically: a power
/// loss mid-write leaves the previous row intact.
#[derive(Debug, Clone)]
pub struct SqliteRefreshStateRepository {
    db_path: PathBuf,
}

impl SqliteRefreshStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn initialize(&self) -> Result<(), PersistError> {
        let connection = self.connect()?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS refresh_state (
                     id INTEGER PRIMARY KEY CHECK (id = 1),
                     payload TEXT NOT NULL
                 )",
                [],
            )
            .map_err(|error| PersistError::WriteFailed(error.to_string()))?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, PersistError> {
        Connection::open(&self.db_path)
            .map_err(|error| PersistError::WriteFailed(error.to_string()))
    }
}

impl RefreshStateRepository for SqliteRefreshStateRepository {
    fn restore(&self) -> Result<Option<RefreshState>, PersistError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row("SELECT payload FROM refresh_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|error| PersistError::CorruptState(error.to_string()))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let state: RefreshState = serde_json::from_str(&payload).map_err(|error| {
            PersistError::CorruptState(format!("invalid refresh_state payload: {error}"))
        })?;
        Ok(Some(state))
    }

    fn commit(&self, state: &RefreshState) -> Result<(), PersistError> {
        let payload = serde_json::to_string(state)
            .map_err(|error| PersistError::WriteFailed(error.to_string()))?;
        let connection = self.connect()?;
        connection
            .execute(
                "INSERT INTO refresh_state (id, payload)
                 VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
                params![payload],
            )
            .map_err(|error| PersistError::WriteFailed(error.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRefreshStateRepository {
    state: Mutex<Option<RefreshState>>,
}

impl RefreshStateRepository for InMemoryRefreshStateRepository {
    fn restore(&self) -> Result<Option<RefreshState>, PersistError> {
        let state = self
            .state
            .lock()
            .map_err(|error| PersistError::CorruptState(format!("state lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn commit(&self, state: &RefreshState) -> Result<(), PersistError> {
        let mut stored = self
            .state
            .lock()
            .map_err(|error| PersistError::WriteFailed(format!("state lock poisoned: {error}")))?;
        *stored = Some(state.clone());
        Ok(())
    }
}
