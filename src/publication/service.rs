/*!
 * Publication service: the publish/unpublish/translate state machine.
 *
 * States per entity are derived, never stored:
 * `unpublished` when nothing is published, `published_latest` when the
 * published snapshot is the newest one, `published_outdated` otherwise.
 * Publishing snapshots the live row (copy-on-write) and points
 * `published_version` at the newest snapshot; unpublishing clears the
 * pointer and keeps the history. Publishing and translating cascade through
 * the graph walker; unpublishing never does.
 */

use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use super::walker::{GraphWalker, NodeAction};
use crate::content::{ContentSchema, Entity, EntityRef, RelationDef, RelationKind};
use crate::database::{EntityData, HistoryEntry, PublicationState, Repository, RevisionId, SnapshotId};
use crate::errors::{CmsError, StorageError};
use crate::translation::TranslationPipeline;

type Result<T> = std::result::Result<T, CmsError>;

pub const COMMENT_CHANGED: &str = "Changed";
pub const COMMENT_PUBLISH: &str = "Publish";
pub const COMMENT_UNPUBLISH: &str = "Unpublish";
pub const COMMENT_TRANSLATED: &str = "Object translated";
pub const COMMENT_TRANSLATED_FORCED: &str = "Object translated (forced)";

/// Orchestrates the revision store, the publication pointer and the walker
#[derive(Clone)]
pub struct PublicationService {
    repository: Repository,
    schema: Arc<ContentSchema>,
    pipeline: TranslationPipeline,
}

impl PublicationService {
    pub fn new(repository: Repository, schema: Arc<ContentSchema>, pipeline: TranslationPipeline) -> Self {
        Self {
            repository,
            schema,
            pipeline,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    pub fn pipeline(&self) -> &TranslationPipeline {
        &self.pipeline
    }

    pub fn walker(&self) -> GraphWalker<'_> {
        GraphWalker::new(&self.schema, &self.repository)
    }

    fn ensure_versioned(&self, reference: &EntityRef) -> Result<()> {
        self.schema.require(&reference.kind)?;
        if self.schema.is_versioned(&reference.kind) {
            Ok(())
        } else {
            Err(CmsError::NotVersioned(reference.clone()))
        }
    }

    /// Insert a new, unpublished entity
    pub async fn create(&self, kind: &str, data: EntityData) -> Result<Entity> {
        self.schema.require(kind)?;
        let entity = self.repository.insert_entity(kind, data).await?;
        info!("Created {}", entity.reference);
        Ok(entity)
    }

    /// Persist live edits and record them as a revision
    ///
    /// Returns `None` when the fields did not change since the last snapshot
    /// or the type is not versioned.
    pub async fn save(&self, entity: &Entity, user: Option<&str>) -> Result<Option<RevisionId>> {
        self.schema.require(entity.kind())?;
        self.repository.save_entity(entity).await?;

        if !self.schema.is_versioned(entity.kind()) {
            return Ok(None);
        }
        Ok(self
            .repository
            .commit(std::slice::from_ref(entity), COMMENT_CHANGED, user)
            .await?)
    }

    /// Derived publication state of an entity
    pub async fn publication_state(&self, reference: &EntityRef) -> Result<PublicationState> {
        let entity = self.repository.get_entity(reference).await?;
        let latest = self.repository.latest_snapshot(reference).await?;
        Ok(PublicationState::derive(
            entity.published_version,
            latest.map(|snapshot| snapshot.id),
        ))
    }

    /// Snapshot the live state if it changed and publish the newest snapshot
    pub async fn publish(&self, reference: &EntityRef, user: Option<&str>) -> Result<SnapshotId> {
        self.ensure_versioned(reference)?;
        let entity = self.repository.get_entity(reference).await?;

        self.repository
            .commit(std::slice::from_ref(&entity), COMMENT_PUBLISH, user)
            .await?;

        let latest = self
            .repository
            .latest_snapshot(reference)
            .await?
            .ok_or_else(|| StorageError::NotFound(reference.clone()))?;

        self.repository
            .set_published_version(reference, Some(latest.id))
            .await?;

        info!("Published {} at snapshot {}", reference, latest.id);
        Ok(latest.id)
    }

    /// Clear the published snapshot, keeping the history
    pub async fn unpublish(&self, reference: &EntityRef, user: Option<&str>) -> Result<()> {
        self.ensure_versioned(reference)?;
        let entity = self.repository.get_entity(reference).await?;

        self.repository
            .commit(std::slice::from_ref(&entity), COMMENT_UNPUBLISH, user)
            .await?;
        self.repository.set_published_version(reference, None).await?;

        info!("Unpublished {}", reference);
        Ok(())
    }

    /// Publish an entity and every versioned entity reachable from it
    pub async fn recursively_publish(&self, root: &EntityRef, user: Option<&str>) -> Result<Vec<EntityRef>> {
        let action = PublishAction { service: self, user };
        let visited = self.walker().walk(root, &action).await?;
        info!("Published {} entities from {}", visited.len(), root);
        Ok(visited)
    }

    /// Translate the missing languages of an entity and its generic sub-items
    ///
    /// With `force` every target language is translated again. An engine
    /// failure leaves the entity and its sub-items untouched.
    pub async fn translate(
        &self,
        reference: &EntityRef,
        user: Option<&str>,
        force: bool,
    ) -> Result<Option<RevisionId>> {
        self.schema.require(&reference.kind)?;
        let mut entity = self.repository.get_entity(reference).await?;

        let children = self
            .pipeline
            .translate_tree(&mut entity, &self.schema, &self.repository, force)
            .await?;

        self.repository.save_entity(&entity).await?;
        for child in &children {
            self.repository.save_entity(child).await?;
        }

        let mut changed = vec![entity];
        changed.extend(children);
        changed.retain(|e| self.schema.is_versioned(e.kind()));

        let comment = if force {
            COMMENT_TRANSLATED_FORCED
        } else {
            COMMENT_TRANSLATED
        };
        let revision = self.repository.commit(&changed, comment, user).await?;

        match revision {
            Some(id) => info!("Translated {} (revision {})", reference, id),
            None => debug!("Translated {}, nothing changed", reference),
        }
        Ok(revision)
    }

    /// Translate an entity and every versioned entity reachable from it
    pub async fn recursively_translate(
        &self,
        root: &EntityRef,
        user: Option<&str>,
        force: bool,
    ) -> Result<Vec<EntityRef>> {
        let action = TranslateAction {
            service: self,
            user,
            force,
        };
        let visited = self.walker().walk(root, &action).await?;
        info!("Translated {} entities from {}", visited.len(), root);
        Ok(visited)
    }

    /// Revision history of an entity, latest first
    pub async fn history(&self, reference: &EntityRef) -> Result<Vec<HistoryEntry>> {
        Ok(self.repository.history(reference).await?)
    }

    /// Delete snapshots older than each entity's published one
    pub async fn delete_outdated_snapshots(&self, older_than_days: i64) -> Result<usize> {
        Ok(self.repository.delete_outdated_snapshots(older_than_days).await?)
    }
}

struct PublishAction<'a> {
    service: &'a PublicationService,
    user: Option<&'a str>,
}

#[async_trait]
impl NodeAction for PublishAction<'_> {
    async fn apply(&self, entity: &EntityRef) -> Result<()> {
        self.service.publish(entity, self.user).await.map(|_| ())
    }
}

struct TranslateAction<'a> {
    service: &'a PublicationService,
    user: Option<&'a str>,
    force: bool,
}

#[async_trait]
impl NodeAction for TranslateAction<'_> {
    async fn apply(&self, entity: &EntityRef) -> Result<()> {
        self.service
            .translate(entity, self.user, self.force)
            .await
            .map(|_| ())
    }

    // Generic sub-items are translated together with their parent
    fn follows(&self, relation: &RelationDef) -> bool {
        relation.kind != RelationKind::Generic
    }
}
