/*!
 * Published read path.
 *
 * Readers only ever see the snapshot an entity's `published_version` points
 * at, never the live row, so edits stay invisible until re-published.
 */

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use serde_json::{Map, Value};

use super::walker::RelationPlan;
use crate::content::{ContentSchema, EntityRef};
use crate::database::{Repository, Snapshot};
use crate::errors::CmsError;

type Result<T> = std::result::Result<T, CmsError>;

/// Serializes published snapshots for API consumers
pub struct PublishedReader<'a> {
    repository: &'a Repository,
    schema: &'a ContentSchema,
}

fn with_id(snapshot: Snapshot) -> Map<String, Value> {
    let mut data = snapshot.field_dict;
    data.insert("id".to_string(), Value::from(snapshot.entity.id));
    data
}

impl<'a> PublishedReader<'a> {
    pub fn new(repository: &'a Repository, schema: &'a ContentSchema) -> Self {
        Self { repository, schema }
    }

    /// Field dict of the published snapshot, `None` when unpublished
    pub async fn published_data(&self, reference: &EntityRef) -> Result<Option<Map<String, Value>>> {
        Ok(self
            .repository
            .published_snapshot(reference)
            .await?
            .map(|snapshot| snapshot.field_dict))
    }

    /// Published field dicts of every published entity of `kind`, with their ids
    pub async fn serialize(&self, kind: &str) -> Result<Vec<Map<String, Value>>> {
        self.schema.require(kind)?;
        let snapshots = self.repository.published_snapshots(kind).await?;
        Ok(snapshots.into_iter().map(with_id).collect())
    }

    /// Published snapshot of an entity with its published related entities nested
    ///
    /// Relations follow the entity type's `RelationPlan`. Collections keep
    /// only published members; a to-one relation to an unpublished entity
    /// is `null`.
    pub async fn published_tree(&self, reference: &EntityRef) -> Result<Option<Value>> {
        self.schema.require(&reference.kind)?;
        let plan = RelationPlan::build(self.schema, &reference.kind);
        self.tree(reference.clone(), &plan).await
    }

    fn tree<'r>(&'r self, reference: EntityRef, plan: &'r RelationPlan) -> BoxFuture<'r, Result<Option<Value>>> {
        async move {
            let Some(snapshot) = self.repository.published_snapshot(&reference).await? else {
                return Ok(None);
            };
            let mut data = with_id(snapshot);

            for planned in &plan.relations {
                let related = self.repository.related(&reference, &planned.relation).await?;

                let value = if planned.relation.kind.is_to_many() {
                    let mut members = Vec::with_capacity(related.len());
                    for member in related {
                        if let Some(tree) = self.tree(member, &planned.plan).await? {
                            members.push(tree);
                        }
                    }
                    Value::Array(members)
                } else {
                    match related.into_iter().next() {
                        Some(target) => self.tree(target, &planned.plan).await?.unwrap_or(Value::Null),
                        None => Value::Null,
                    }
                };
                data.insert(planned.relation.name.clone(), value);
            }

            debug!("Materialized published {}", reference);
            Ok(Some(Value::Object(data)))
        }
        .boxed()
    }
}
