/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::content::{Entity, EntityRef, LocalizedValue};

/// Identifier of a committed revision
pub type RevisionId = i64;

/// Identifier of a snapshot; larger ids are more recent
pub type SnapshotId = i64;

/// Format a timestamp the way every table stores it
///
/// Fixed microsecond precision with a `Z` suffix keeps lexical order
/// identical to chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

/// Derived publication state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    /// No snapshot is published
    Unpublished,
    /// The published snapshot is the most recent one
    PublishedLatest,
    /// A newer snapshot exists than the published one
    PublishedOutdated,
}

impl PublicationState {
    /// Compute the state from the published pointer and the latest snapshot id
    pub fn derive(published: Option<SnapshotId>, latest: Option<SnapshotId>) -> Self {
        match published {
            None => PublicationState::Unpublished,
            Some(id) if Some(id) == latest => PublicationState::PublishedLatest,
            Some(_) => PublicationState::PublishedOutdated,
        }
    }

    /// Whether any snapshot is published
    pub fn is_published(self) -> bool {
        !matches!(self, PublicationState::Unpublished)
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationState::Unpublished => write!(f, "unpublished"),
            PublicationState::PublishedLatest => write!(f, "published_latest"),
            PublicationState::PublishedOutdated => write!(f, "published_outdated"),
        }
    }
}

/// Live field data of an entity row, stored as JSON in `entities.data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    #[serde(default)]
    pub localized: BTreeMap<String, LocalizedValue>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl EntityData {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            localized: entity.localized.clone(),
            attributes: entity.attributes.clone(),
        }
    }

    /// Rebuild the entity held by a row
    pub fn into_entity(self, reference: EntityRef, published_version: Option<SnapshotId>) -> Entity {
        Entity {
            reference,
            localized: self.localized,
            attributes: self.attributes,
            published_version,
        }
    }
}

/// Revision record, one committed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: RevisionId,
    /// RFC 3339 creation time
    pub date_created: String,
    pub comment: String,
    /// Acting user, audit only
    pub user_id: Option<String>,
}

/// Immutable snapshot ("version") of one entity's field dict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub revision_id: RevisionId,
    pub entity: EntityRef,
    /// Serialized field values at commit time
    pub field_dict: Map<String, Value>,
    /// SHA-256 of the canonical field dict
    pub data_hash: String,
}

/// One line of an entity's revision history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub revision: RevisionRecord,
    pub snapshot_id: SnapshotId,
}
