/*!
 * Content model: the schema registry and the entity types that flow through
 * the revision store, the graph walker and the translation pipeline.
 *
 * - `schema`: content type declarations and their relations
 * - `entity`: entities, localized values and typed (kind, id) references
 */

pub mod entity;
pub mod schema;

pub use entity::{Entity, EntityRef, LocalizedValue};
pub use schema::{ContentSchema, EntityType, RelationDef, RelationKind};
