/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the entity rows, their relation
 * links and the append-only revision log, and handles schema migrations for
 * version upgrades.
 */

use log::{debug, info};
use rusqlite::Connection;

use crate::errors::StorageError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
    // Foreign keys are a per-connection setting
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<(), StorageError> {
    // WAL is not available for in-memory databases; SQLite ignores it there
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Revisions group the snapshots produced by one commit
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date_created TEXT NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            user_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_revisions_date ON revisions(date_created);
        "#,
    )?;

    // Snapshots ("versions"), ids grow monotonically and order recency
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            revision_id INTEGER NOT NULL REFERENCES revisions(id) ON DELETE CASCADE,
            entity_kind TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            serialized_data TEXT NOT NULL,
            data_hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_versions_entity ON versions(entity_kind, entity_id, id);
        CREATE INDEX IF NOT EXISTS idx_versions_revision ON versions(revision_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            data TEXT NOT NULL,
            published_version_id INTEGER REFERENCES versions(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);
        CREATE INDEX IF NOT EXISTS idx_entities_published ON entities(published_version_id);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_kind TEXT NOT NULL,
            source_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            relation TEXT NOT NULL,
            target_kind TEXT NOT NULL,
            target_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0,
            UNIQUE(source_id, relation, target_id)
        );

        CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_id, relation);
        CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_id, relation);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), StorageError> {
    let current = from_version;

    if current < SCHEMA_VERSION {
        return Err(StorageError::Task(format!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        )));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
