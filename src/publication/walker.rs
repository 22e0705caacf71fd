/*!
 * Dependency graph walker and relation planning.
 *
 * `GraphWalker` applies an action to an entity and to every entity reachable
 * through its relations, exactly once per (kind, id), however many paths
 * lead to it. Relations whose target type is not versioned are not
 * followed. Collections are read from the store when their owner is
 * expanded, so links added by an earlier action are seen.
 *
 * `RelationPlan` is the static counterpart: the tree of relations to load
 * when materializing the published view of a type.
 */

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::future::Future;

use crate::content::{ContentSchema, EntityRef, RelationDef};
use crate::database::Repository;
use crate::errors::CmsError;

/// Action applied to each node of a walk
#[async_trait]
pub trait NodeAction: Send + Sync {
    async fn apply(&self, entity: &EntityRef) -> Result<(), CmsError>;

    /// Whether the walk continues through `relation` after this action
    fn follows(&self, relation: &RelationDef) -> bool {
        let _ = relation;
        true
    }
}

/// Adapts an async closure into a `NodeAction`
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> NodeAction for FnAction<F>
where
    F: Fn(EntityRef) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CmsError>> + Send,
{
    async fn apply(&self, entity: &EntityRef) -> Result<(), CmsError> {
        (self.f)(entity.clone()).await
    }
}

/// Depth-first traversal over the relations declared in a schema
pub struct GraphWalker<'a> {
    schema: &'a ContentSchema,
    repository: &'a Repository,
}

impl<'a> GraphWalker<'a> {
    pub fn new(schema: &'a ContentSchema, repository: &'a Repository) -> Self {
        Self { schema, repository }
    }

    /// Walk from `root`, returning the visited entities in visit order
    pub async fn walk(&self, root: &EntityRef, action: &dyn NodeAction) -> Result<Vec<EntityRef>, CmsError> {
        let mut visited = HashSet::new();
        self.walk_with_visited(root, action, &mut visited).await
    }

    /// Walk from `root`, skipping and extending a caller-owned visited set
    ///
    /// The first action failure aborts the walk; actions already applied
    /// are kept.
    pub async fn walk_with_visited(
        &self,
        root: &EntityRef,
        action: &dyn NodeAction,
        visited: &mut HashSet<EntityRef>,
    ) -> Result<Vec<EntityRef>, CmsError> {
        let mut order = Vec::new();
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if visited.contains(&node) {
                continue;
            }

            action.apply(&node).await.map_err(|e| CmsError::GraphWalk {
                entity: node.clone(),
                source: Box::new(e),
            })?;
            visited.insert(node.clone());

            let mut children = Vec::new();
            for relation in self.schema.relations(&node.kind) {
                if !self.schema.is_versioned(&relation.target) || !action.follows(relation) {
                    continue;
                }
                children.extend(self.repository.related(&node, relation).await?);
            }

            debug!("Visited {} ({} related)", node, children.len());
            // Reversed so the first declared relation is expanded first
            stack.extend(children.into_iter().rev());
            order.push(node);
        }

        Ok(order)
    }
}

/// One relation of a plan, with the plan of its target
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRelation {
    pub relation: RelationDef,
    pub plan: RelationPlan,
}

/// Tree of relations to load together with an entity of `kind`
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPlan {
    pub kind: String,
    pub relations: Vec<PlannedRelation>,
}

impl RelationPlan {
    /// Plan every versioned relation reachable from `kind`
    ///
    /// A type already on the current path is not entered again, which
    /// bounds the plan for cyclic schemas.
    pub fn build(schema: &ContentSchema, kind: &str) -> Self {
        let mut path = vec![kind.to_string()];
        Self::build_on_path(schema, kind, &mut path)
    }

    fn build_on_path(schema: &ContentSchema, kind: &str, path: &mut Vec<String>) -> Self {
        let mut relations = Vec::new();

        for relation in schema.relations(kind) {
            if !schema.is_versioned(&relation.target) || path.contains(&relation.target) {
                continue;
            }
            path.push(relation.target.clone());
            let plan = Self::build_on_path(schema, &relation.target, path);
            path.pop();
            relations.push(PlannedRelation {
                relation: relation.clone(),
                plan,
            });
        }

        Self {
            kind: kind.to_string(),
            relations,
        }
    }

    /// Flatten the plan into `__`-joined `(prefetch, select)` path lists
    ///
    /// Collections and everything below them are prefetched; to-one
    /// relations are selected along with the entity. Every entity node
    /// contributes its `published_version`.
    pub fn prefetch_paths(&self) -> (Vec<String>, Vec<String>) {
        let mut prefetch = Vec::new();
        let mut select = vec!["published_version".to_string()];

        for planned in &self.relations {
            let name = &planned.relation.name;
            let (child_prefetch, child_select) = planned.plan.prefetch_paths();
            let nested = |paths: Vec<String>| -> Vec<String> {
                paths.into_iter().map(|p| format!("{}__{}", name, p)).collect()
            };

            if planned.relation.kind.is_to_many() {
                prefetch.push(name.clone());
                prefetch.extend(nested(child_prefetch));
                prefetch.extend(nested(child_select));
            } else {
                select.push(name.clone());
                prefetch.extend(nested(child_prefetch));
                select.extend(nested(child_select));
            }
        }

        (prefetch, select)
    }
}
