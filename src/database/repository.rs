/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access to
 * entity rows, relation links and the append-only revision log.
 */

use chrono::{TimeDelta, Utc};
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use super::connection::DatabaseConnection;
use super::models::{
    format_timestamp, timestamp_now, EntityData, HistoryEntry, RevisionId, RevisionRecord,
    Snapshot, SnapshotId,
};
use crate::content::{Entity, EntityRef, RelationDef};
use crate::errors::StorageError;

type Result<T> = std::result::Result<T, StorageError>;

const SNAPSHOT_COLUMNS: &str =
    "v.id, v.revision_id, v.entity_kind, v.entity_id, v.serialized_data, v.data_hash";

type SnapshotRow = (i64, i64, String, i64, String, String);
type EntityRow = (i64, String, String, Option<i64>);

fn read_snapshot_row(row: &rusqlite::Row) -> rusqlite::Result<SnapshotRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn read_entity_row(row: &rusqlite::Row) -> rusqlite::Result<EntityRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_snapshot(row: SnapshotRow) -> Result<Snapshot> {
    let (id, revision_id, kind, entity_id, data, data_hash) = row;
    Ok(Snapshot {
        id,
        revision_id,
        entity: EntityRef::new(kind, entity_id),
        field_dict: serde_json::from_str(&data)?,
        data_hash,
    })
}

fn into_entity(row: EntityRow) -> Result<Entity> {
    let (id, kind, data, published_version) = row;
    let data: EntityData = serde_json::from_str(&data)?;
    Ok(data.into_entity(EntityRef::new(kind, id), published_version))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Entity Operations
    // =========================================================================

    /// Insert a new, unpublished entity and return it with its assigned id
    pub async fn insert_entity(&self, kind: &str, data: EntityData) -> Result<Entity> {
        let kind = kind.to_string();

        self.db
            .execute_async(move |conn| {
                let now = timestamp_now();
                conn.execute(
                    r#"
                    INSERT INTO entities (kind, data, published_version_id, created_at, updated_at)
                    VALUES (?1, ?2, NULL, ?3, ?3)
                    "#,
                    params![kind, serde_json::to_string(&data)?, now],
                )?;
                let reference = EntityRef::new(kind, conn.last_insert_rowid());
                debug!("Inserted entity {}", reference);
                Ok(data.into_entity(reference, None))
            })
            .await
    }

    /// Get an entity, failing with `NotFound` when it does not exist
    pub async fn get_entity(&self, reference: &EntityRef) -> Result<Entity> {
        self.find_entity(reference)
            .await?
            .ok_or_else(|| StorageError::NotFound(reference.clone()))
    }

    /// Get an entity if it exists
    pub async fn find_entity(&self, reference: &EntityRef) -> Result<Option<Entity>> {
        let reference = reference.clone();

        self.db
            .execute_async(move |conn| Self::find_entity_sync(conn, &reference))
            .await
    }

    fn find_entity_sync(conn: &Connection, reference: &EntityRef) -> Result<Option<Entity>> {
        let row = conn
            .query_row(
                "SELECT id, kind, data, published_version_id FROM entities WHERE id = ?1 AND kind = ?2",
                params![reference.id, reference.kind],
                read_entity_row,
            )
            .optional()?;

        row.map(into_entity).transpose()
    }

    fn ensure_entity_exists(conn: &Connection, reference: &EntityRef) -> Result<()> {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE id = ?1 AND kind = ?2",
            params![reference.id, reference.kind],
            |row| row.get(0),
        )?;

        if exists {
            Ok(())
        } else {
            Err(StorageError::NotFound(reference.clone()))
        }
    }

    /// Persist the live fields of an entity
    ///
    /// The published pointer is left as stored; only `set_published_version`
    /// moves it.
    pub async fn save_entity(&self, entity: &Entity) -> Result<()> {
        let reference = entity.reference.clone();
        let data = serde_json::to_string(&EntityData::from_entity(entity))?;

        self.db
            .transaction_async(move |tx| {
                let updated = tx.execute(
                    r#"
                    UPDATE entities
                    SET data = ?1, updated_at = ?2
                    WHERE id = ?3 AND kind = ?4
                    "#,
                    params![data, timestamp_now(), reference.id, reference.kind],
                )?;

                if updated == 0 {
                    return Err(StorageError::NotFound(reference));
                }
                Ok(())
            })
            .await
    }

    /// List all entities of a type, in id order
    pub async fn list_entities(&self, kind: &str) -> Result<Vec<Entity>> {
        self.list_where(kind, false).await
    }

    /// List the entities of a type that have a published snapshot
    pub async fn list_published(&self, kind: &str) -> Result<Vec<Entity>> {
        self.list_where(kind, true).await
    }

    async fn list_where(&self, kind: &str, published_only: bool) -> Result<Vec<Entity>> {
        let kind = kind.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = if published_only {
                    "SELECT id, kind, data, published_version_id FROM entities
                     WHERE kind = ?1 AND published_version_id IS NOT NULL ORDER BY id"
                } else {
                    "SELECT id, kind, data, published_version_id FROM entities
                     WHERE kind = ?1 ORDER BY id"
                };

                let mut stmt = conn.prepare(sql)?;
                let rows = stmt
                    .query_map([&kind], read_entity_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                rows.into_iter().map(into_entity).collect()
            })
            .await
    }

    // =========================================================================
    // Relation Operations
    // =========================================================================

    /// Replace the target of a to-one relation (`None` clears it)
    pub async fn set_relation(
        &self,
        source: &EntityRef,
        relation: &str,
        target: Option<&EntityRef>,
    ) -> Result<()> {
        let source = source.clone();
        let relation = relation.to_string();
        let target = target.cloned();

        self.db
            .transaction_async(move |tx| {
                Self::ensure_entity_exists(tx, &source)?;
                tx.execute(
                    "DELETE FROM relations WHERE source_id = ?1 AND relation = ?2",
                    params![source.id, relation],
                )?;

                if let Some(target) = target {
                    Self::ensure_entity_exists(tx, &target)?;
                    tx.execute(
                        r#"
                        INSERT INTO relations (source_kind, source_id, relation, target_kind, target_id, position)
                        VALUES (?1, ?2, ?3, ?4, ?5, 0)
                        "#,
                        params![source.kind, source.id, relation, target.kind, target.id],
                    )?;
                }
                Ok(())
            })
            .await
    }

    /// Add a member to a to-many relation
    ///
    /// Without an explicit position the member is appended after the current
    /// last one. Adding an existing member only updates its position.
    pub async fn add_relation(
        &self,
        source: &EntityRef,
        relation: &str,
        target: &EntityRef,
        position: Option<i64>,
    ) -> Result<()> {
        let source = source.clone();
        let relation = relation.to_string();
        let target = target.clone();

        self.db
            .transaction_async(move |tx| {
                Self::ensure_entity_exists(tx, &source)?;
                Self::ensure_entity_exists(tx, &target)?;

                let position = match position {
                    Some(position) => position,
                    None => tx.query_row(
                        "SELECT COALESCE(MAX(position) + 1, 0) FROM relations WHERE source_id = ?1 AND relation = ?2",
                        params![source.id, relation],
                        |row| row.get(0),
                    )?,
                };

                tx.execute(
                    r#"
                    INSERT INTO relations (source_kind, source_id, relation, target_kind, target_id, position)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(source_id, relation, target_id) DO UPDATE SET position = excluded.position
                    "#,
                    params![source.kind, source.id, relation, target.kind, target.id, position],
                )?;
                Ok(())
            })
            .await
    }

    /// Remove a member from a relation, returning whether it was linked
    pub async fn remove_relation(
        &self,
        source: &EntityRef,
        relation: &str,
        target: &EntityRef,
    ) -> Result<bool> {
        let source = source.clone();
        let relation = relation.to_string();
        let target = target.clone();

        self.db
            .execute_async(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM relations WHERE source_id = ?1 AND relation = ?2 AND target_id = ?3",
                    params![source.id, relation, target.id],
                )?;
                Ok(removed > 0)
            })
            .await
    }

    /// Entities currently linked through a relation of `entity`
    ///
    /// Forward relations are ordered by position, then insertion. Reverse
    /// relations look up the links declared on the other side.
    pub async fn related(&self, entity: &EntityRef, relation: &RelationDef) -> Result<Vec<EntityRef>> {
        let entity = entity.clone();
        let relation = relation.clone();

        self.db
            .execute_async(move |conn| {
                let rows = match &relation.reverse_of {
                    None => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT target_kind, target_id FROM relations
                            WHERE source_kind = ?1 AND source_id = ?2 AND relation = ?3
                            ORDER BY position, id
                            "#,
                        )?;
                        let rows = stmt
                            .query_map(params![entity.kind, entity.id, relation.name], |row| {
                                Ok(EntityRef::new(row.get::<_, String>(0)?, row.get(1)?))
                            })?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                    Some(forward) => {
                        let mut stmt = conn.prepare(
                            r#"
                            SELECT source_kind, source_id FROM relations
                            WHERE target_kind = ?1 AND target_id = ?2 AND relation = ?3 AND source_kind = ?4
                            ORDER BY source_id
                            "#,
                        )?;
                        let rows = stmt
                            .query_map(
                                params![entity.kind, entity.id, forward, relation.target],
                                |row| Ok(EntityRef::new(row.get::<_, String>(0)?, row.get(1)?)),
                            )?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows
                    }
                };
                Ok(rows)
            })
            .await
    }

    // =========================================================================
    // Revision Operations
    // =========================================================================

    /// Compute SHA256 hash of text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Snapshot every entity whose fields changed since its last snapshot
    ///
    /// All snapshots land in one new revision inside a single transaction.
    /// Returns `None` without creating a revision when nothing changed.
    pub async fn commit(
        &self,
        entities: &[Entity],
        comment: &str,
        user: Option<&str>,
    ) -> Result<Option<RevisionId>> {
        let entities = entities.to_vec();
        let comment = comment.to_string();
        let user = user.map(str::to_string);

        self.db
            .transaction_async(move |tx| Self::commit_sync(tx, &entities, &comment, user.as_deref()))
            .await
    }

    fn commit_sync(
        conn: &Connection,
        entities: &[Entity],
        comment: &str,
        user: Option<&str>,
    ) -> Result<Option<RevisionId>> {
        let mut seen = HashSet::new();
        let mut changed = Vec::new();

        for entity in entities {
            if !seen.insert(entity.reference.clone()) {
                continue;
            }

            // serde_json maps are key-ordered, so equal field dicts serialize identically
            let serialized = serde_json::to_string(&entity.field_dict())?;
            let hash = Self::hash_text(&serialized);

            let latest: Option<String> = conn
                .query_row(
                    "SELECT data_hash FROM versions WHERE entity_kind = ?1 AND entity_id = ?2 ORDER BY id DESC LIMIT 1",
                    params![entity.reference.kind, entity.reference.id],
                    |row| row.get(0),
                )
                .optional()?;

            if latest.as_deref() == Some(hash.as_str()) {
                debug!("{} unchanged since its last snapshot", entity.reference);
                continue;
            }
            changed.push((&entity.reference, serialized, hash));
        }

        if changed.is_empty() {
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO revisions (date_created, comment, user_id) VALUES (?1, ?2, ?3)",
            params![timestamp_now(), comment, user],
        )?;
        let revision_id = conn.last_insert_rowid();

        for (reference, serialized, hash) in &changed {
            conn.execute(
                r#"
                INSERT INTO versions (revision_id, entity_kind, entity_id, serialized_data, data_hash)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![revision_id, reference.kind, reference.id, serialized, hash],
            )?;
        }

        debug!(
            "Committed revision {} '{}' with {} snapshot(s)",
            revision_id,
            comment,
            changed.len()
        );
        Ok(Some(revision_id))
    }

    fn query_snapshots<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<Snapshot>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, read_snapshot_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_snapshot).collect()
    }

    /// Highest-id snapshot of an entity
    pub async fn latest_snapshot(&self, entity: &EntityRef) -> Result<Option<Snapshot>> {
        let entity = entity.clone();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM versions v WHERE v.entity_kind = ?1 AND v.entity_id = ?2 ORDER BY v.id DESC LIMIT 1",
                    SNAPSHOT_COLUMNS
                );
                Ok(Self::query_snapshots(conn, &sql, params![entity.kind, entity.id])?
                    .into_iter()
                    .next())
            })
            .await
    }

    /// All snapshots of an entity, latest first
    pub async fn snapshots_for(&self, entity: &EntityRef) -> Result<Vec<Snapshot>> {
        let entity = entity.clone();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM versions v WHERE v.entity_kind = ?1 AND v.entity_id = ?2 ORDER BY v.id DESC",
                    SNAPSHOT_COLUMNS
                );
                Self::query_snapshots(conn, &sql, params![entity.kind, entity.id])
            })
            .await
    }

    /// Snapshots of an entity strictly older than `snapshot_id`, latest first
    pub async fn snapshots_older_than(
        &self,
        entity: &EntityRef,
        snapshot_id: SnapshotId,
    ) -> Result<Vec<Snapshot>> {
        let entity = entity.clone();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM versions v WHERE v.entity_kind = ?1 AND v.entity_id = ?2 AND v.id < ?3 ORDER BY v.id DESC",
                    SNAPSHOT_COLUMNS
                );
                Self::query_snapshots(conn, &sql, params![entity.kind, entity.id, snapshot_id])
            })
            .await
    }

    /// Snapshot by id
    pub async fn get_snapshot(&self, snapshot_id: SnapshotId) -> Result<Option<Snapshot>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT {} FROM versions v WHERE v.id = ?1", SNAPSHOT_COLUMNS);
                Ok(Self::query_snapshots(conn, &sql, [snapshot_id])?.into_iter().next())
            })
            .await
    }

    /// Snapshot an entity currently publishes, if any
    pub async fn published_snapshot(&self, entity: &EntityRef) -> Result<Option<Snapshot>> {
        let entity = entity.clone();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM entities e JOIN versions v ON v.id = e.published_version_id
                     WHERE e.id = ?1 AND e.kind = ?2",
                    SNAPSHOT_COLUMNS
                );
                Ok(Self::query_snapshots(conn, &sql, params![entity.id, entity.kind])?
                    .into_iter()
                    .next())
            })
            .await
    }

    /// Published snapshots of every published entity of a type, in entity id order
    pub async fn published_snapshots(&self, kind: &str) -> Result<Vec<Snapshot>> {
        let kind = kind.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM entities e JOIN versions v ON v.id = e.published_version_id
                     WHERE e.kind = ?1 ORDER BY e.id",
                    SNAPSHOT_COLUMNS
                );
                Self::query_snapshots(conn, &sql, [&kind])
            })
            .await
    }

    /// Revision by id
    pub async fn get_revision(&self, revision_id: RevisionId) -> Result<Option<RevisionRecord>> {
        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, date_created, comment, user_id FROM revisions WHERE id = ?1",
                        [revision_id],
                        |row| {
                            Ok(RevisionRecord {
                                id: row.get(0)?,
                                date_created: row.get(1)?,
                                comment: row.get(2)?,
                                user_id: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;

                Ok(result)
            })
            .await
    }

    /// Revision history of an entity, latest first
    pub async fn history(&self, entity: &EntityRef) -> Result<Vec<HistoryEntry>> {
        let entity = entity.clone();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT r.id, r.date_created, r.comment, r.user_id, v.id
                    FROM versions v JOIN revisions r ON r.id = v.revision_id
                    WHERE v.entity_kind = ?1 AND v.entity_id = ?2
                    ORDER BY v.id DESC
                    "#,
                )?;

                let entries = stmt
                    .query_map(params![entity.kind, entity.id], |row| {
                        Ok(HistoryEntry {
                            revision: RevisionRecord {
                                id: row.get(0)?,
                                date_created: row.get(1)?,
                                comment: row.get(2)?,
                                user_id: row.get(3)?,
                            },
                            snapshot_id: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(entries)
            })
            .await
    }

    // =========================================================================
    // Publication Operations
    // =========================================================================

    fn check_snapshot_owner(
        conn: &Connection,
        entity: &EntityRef,
        snapshot_id: SnapshotId,
    ) -> Result<()> {
        let owner: Option<(String, i64)> = conn
            .query_row(
                "SELECT entity_kind, entity_id FROM versions WHERE id = ?1",
                [snapshot_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match owner {
            Some((kind, id)) if kind == entity.kind && id == entity.id => Ok(()),
            _ => Err(StorageError::ForeignSnapshot {
                entity: entity.clone(),
                snapshot_id,
            }),
        }
    }

    /// Point an entity's `published_version` at one of its own snapshots, or clear it
    pub async fn set_published_version(
        &self,
        entity: &EntityRef,
        snapshot_id: Option<SnapshotId>,
    ) -> Result<()> {
        let entity = entity.clone();

        self.db
            .transaction_async(move |tx| {
                if let Some(snapshot_id) = snapshot_id {
                    Self::check_snapshot_owner(tx, &entity, snapshot_id)?;
                }

                let updated = tx.execute(
                    "UPDATE entities SET published_version_id = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
                    params![snapshot_id, timestamp_now(), entity.id, entity.kind],
                )?;

                if updated == 0 {
                    return Err(StorageError::NotFound(entity.clone()));
                }
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Retention Operations
    // =========================================================================

    /// Hard-delete snapshots, refusing when any of them is currently published
    ///
    /// Revisions left without snapshots are deleted as well.
    pub async fn delete_snapshots(&self, snapshot_ids: &[SnapshotId]) -> Result<usize> {
        let snapshot_ids = snapshot_ids.to_vec();

        self.db
            .transaction_async(move |tx| Self::delete_snapshots_sync(tx, &snapshot_ids))
            .await
    }

    fn delete_snapshots_sync(conn: &Connection, snapshot_ids: &[SnapshotId]) -> Result<usize> {
        if snapshot_ids.is_empty() {
            return Ok(0);
        }
        let marks = placeholders(snapshot_ids.len());

        let published: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT published_version_id FROM entities WHERE published_version_id IN ({}) LIMIT 1",
                    marks
                ),
                params_from_iter(snapshot_ids.iter()),
                |row| row.get(0),
            )
            .optional()?;

        if let Some(snapshot_id) = published {
            return Err(StorageError::PublishedSnapshot(snapshot_id));
        }

        let revision_ids: Vec<i64> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT revision_id FROM versions WHERE id IN ({})",
                marks
            ))?;
            let ids = stmt
                .query_map(params_from_iter(snapshot_ids.iter()), |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        let deleted = conn.execute(
            &format!("DELETE FROM versions WHERE id IN ({})", marks),
            params_from_iter(snapshot_ids.iter()),
        )?;

        for revision_id in revision_ids {
            conn.execute(
                "DELETE FROM revisions WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM versions WHERE revision_id = ?1)",
                [revision_id],
            )?;
        }

        Ok(deleted)
    }

    /// Delete, across all published entities, the snapshots older than their published one
    ///
    /// Only snapshots from revisions created more than `older_than_days` days
    /// ago are considered; snapshots referenced as any entity's
    /// `published_version` are never selected.
    pub async fn delete_outdated_snapshots(&self, older_than_days: i64) -> Result<usize> {
        let cutoff = TimeDelta::try_days(older_than_days)
            .filter(|_| older_than_days >= 0)
            .and_then(|period| Utc::now().checked_sub_signed(period))
            .map(format_timestamp)
            .ok_or(StorageError::InvalidRetention(older_than_days))?;

        self.db
            .transaction_async(move |tx| {
                let outdated: Vec<i64> = {
                    let mut stmt = tx.prepare(
                        r#"
                        SELECT v.id FROM versions v
                        JOIN entities e ON e.id = v.entity_id AND e.kind = v.entity_kind
                        JOIN revisions r ON r.id = v.revision_id
                        WHERE e.published_version_id IS NOT NULL
                          AND v.id < e.published_version_id
                          AND r.date_created < ?1
                          AND v.id NOT IN (
                              SELECT published_version_id FROM entities
                              WHERE published_version_id IS NOT NULL
                          )
                        ORDER BY v.id
                        "#,
                    )?;
                    let ids = stmt
                        .query_map([&cutoff], |row| row.get(0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    ids
                };

                let deleted = Self::delete_snapshots_sync(tx, &outdated)?;
                info!("Deleted {} outdated snapshot(s)", deleted);
                Ok(deleted)
            })
            .await
    }
}
