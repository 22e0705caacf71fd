/*!
 * Content schema registry.
 *
 * Every content type declares its localized fields and its relations up
 * front; the schema is built once at startup and shared by the repository,
 * the graph walker, the relation planner and the translation pipeline.
 * Relations that declare a `related_name` also become traversable from the
 * target type through a synthesized reverse relation.
 */

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::SchemaError;

/// Cardinality of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
    /// Sub-items attached to their parent through a (kind, id) pair
    Generic,
}

impl RelationKind {
    /// Whether the relation resolves to a collection
    pub fn is_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany | Self::Generic)
    }

    fn reverse(self) -> Self {
        match self {
            Self::OneToOne => Self::OneToOne,
            Self::ManyToOne => Self::OneToMany,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToMany => Self::ManyToMany,
            Self::Generic => Self::ManyToOne,
        }
    }
}

/// A relation declared on a content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, unique per type
    pub name: String,
    /// Cardinality
    pub kind: RelationKind,
    /// Target content type
    pub target: String,
    /// Whether collection members carry a position (ordered through link)
    #[serde(default)]
    pub ordered: bool,
    /// Name of the reverse relation exposed on the target type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_name: Option<String>,
    /// Forward relation name when this relation was synthesized as a reverse
    #[serde(skip)]
    pub reverse_of: Option<String>,
}

impl RelationDef {
    pub fn new(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            ordered: false,
            related_name: None,
            reverse_of: None,
        }
    }

    /// Mark collection members as positioned
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Expose a reverse relation on the target type
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    /// Whether this is a synthesized reverse relation
    pub fn is_reverse(&self) -> bool {
        self.reverse_of.is_some()
    }
}

fn default_true() -> bool {
    true
}

/// Declaration of one content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Type name, used as the `kind` of entity references
    pub name: String,
    /// Names of the localized fields, in declaration order
    #[serde(default)]
    pub localized_fields: Vec<String>,
    /// Relations to other types, in declaration order
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    /// Whether the type participates in revisions and publication
    #[serde(default = "default_true")]
    pub versioned: bool,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            localized_fields: Vec::new(),
            relations: Vec::new(),
            versioned: true,
        }
    }

    pub fn localized_field(mut self, field: impl Into<String>) -> Self {
        self.localized_fields.push(field.into());
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn unversioned(mut self) -> Self {
        self.versioned = false;
        self
    }

    /// Relation by name
    pub fn find_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Validated registry of content types
#[derive(Debug, Clone)]
pub struct ContentSchema {
    types: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl ContentSchema {
    /// Build and validate a schema, synthesizing reverse relations
    pub fn new(types: Vec<EntityType>) -> Result<Self, SchemaError> {
        let mut index = HashMap::new();
        for (position, entity_type) in types.iter().enumerate() {
            if index.insert(entity_type.name.clone(), position).is_some() {
                return Err(SchemaError::DuplicateType(entity_type.name.clone()));
            }
        }

        let mut reverses: Vec<(usize, RelationDef)> = Vec::new();
        for entity_type in &types {
            for relation in &entity_type.relations {
                let Some(&target) = index.get(&relation.target) else {
                    return Err(SchemaError::UnknownTarget {
                        kind: entity_type.name.clone(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    });
                };
                if relation.kind == RelationKind::Generic {
                    continue;
                }
                if let Some(related_name) = &relation.related_name {
                    reverses.push((
                        target,
                        RelationDef {
                            name: related_name.clone(),
                            kind: relation.kind.reverse(),
                            target: entity_type.name.clone(),
                            ordered: relation.ordered,
                            related_name: None,
                            reverse_of: Some(relation.name.clone()),
                        },
                    ));
                }
            }
        }

        let mut types = types;
        for (target, relation) in reverses {
            types[target].relations.push(relation);
        }

        for entity_type in &types {
            let mut seen = HashSet::new();
            for relation in &entity_type.relations {
                if !seen.insert(relation.name.as_str()) {
                    return Err(SchemaError::DuplicateRelation {
                        kind: entity_type.name.clone(),
                        relation: relation.name.clone(),
                    });
                }
            }
        }

        Ok(Self { types, index })
    }

    /// Content type by name
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Content type by name, failing for unknown names
    pub fn require(&self, name: &str) -> Result<&EntityType, SchemaError> {
        self.entity_type(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// Whether entities of this type participate in publication
    pub fn is_versioned(&self, name: &str) -> bool {
        self.entity_type(name).is_some_and(|t| t.versioned)
    }

    /// Declared and reverse relations of a type
    pub fn relations(&self, name: &str) -> &[RelationDef] {
        self.entity_type(name)
            .map(|t| t.relations.as_slice())
            .unwrap_or(&[])
    }

    /// Localized fields of a type
    pub fn localized_fields(&self, name: &str) -> &[String] {
        self.entity_type(name)
            .map(|t| t.localized_fields.as_slice())
            .unwrap_or(&[])
    }

    /// All registered types in declaration order
    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.iter()
    }
}
