/*!
 * Database module for persistent storage of content and its revision log.
 *
 * This module provides SQLite-based persistence for:
 * - Entity rows with their live localized fields and published pointer
 * - Relation links between entities, optionally positioned
 * - The append-only log of revisions and their snapshots
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use models::{EntityData, HistoryEntry, PublicationState, RevisionId, RevisionRecord, Snapshot, SnapshotId};
pub use repository::Repository;
