/*!
 * Database connection management.
 *
 * This module handles SQLite database connection creation, initialization,
 * and provides async-safe access patterns using tokio's spawn_blocking.
 */

use log::{debug, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::schema;
use crate::errors::StorageError;

/// Default database filename
const DEFAULT_DB_FILENAME: &str = "content.db";

/// Default database directory name under user's data directory
const DEFAULT_DB_DIRNAME: &str = "headless-cms";

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct DatabaseConnection {
    /// Path to the database file
    db_path: PathBuf,
    /// Thread-safe connection wrapped in Arc<Mutex>
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Create a new database connection at the default location
    pub fn new_default() -> Result<Self, StorageError> {
        let db_path = Self::default_database_path()?;
        Self::new(&db_path)
    }

    /// Create a new database connection at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Task(format!(
                    "Failed to create database directory {:?}: {}",
                    parent, e
                ))
            })?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, StorageError> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory()?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the default database path
    pub fn default_database_path() -> Result<PathBuf, StorageError> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| StorageError::Task("Could not determine data directory".into()))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a database operation with the connection
    ///
    /// This method acquires the mutex lock and executes the provided closure
    /// with access to the connection. For async contexts, use `execute_async`.
    pub fn execute<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| StorageError::Task(format!("Failed to acquire database lock: {}", e)))?;

        f(&conn)
    }

    /// Execute a database operation asynchronously using spawn_blocking
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StorageError::Task(format!("Failed to acquire database lock: {}", e))
            })?;

            f(&conn)
        })
        .await?
    }

    /// Begin a transaction and execute operations within it
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, StorageError>,
    {
        let mut conn = self
            .connection
            .lock()
            .map_err(|e| StorageError::Task(format!("Failed to acquire database lock: {}", e)))?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }

    /// Begin an async transaction and execute operations within it
    ///
    /// The transaction rolls back when the closure fails.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StorageError::Task(format!("Failed to acquire database lock: {}", e))
            })?;

            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;

            Ok(result)
        })
        .await?
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats, StorageError> {
        self.execute(|conn| {
            let count = |table: &str| -> Result<i64, StorageError> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
            };

            let published_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE published_version_id IS NOT NULL",
                [],
                |row| row.get(0),
            )?;

            Ok(DatabaseStats {
                entity_count: count("entities")?,
                published_count,
                revision_count: count("revisions")?,
                snapshot_count: count("versions")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Number of stored entities
    pub entity_count: i64,
    /// Number of entities with a published snapshot
    pub published_count: i64,
    /// Number of revisions
    pub revision_count: i64,
    /// Number of snapshots
    pub snapshot_count: i64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entities: {} ({} published), Revisions: {}, Snapshots: {}",
            self.entity_count, self.published_count, self.revision_count, self.snapshot_count
        )
    }
}
