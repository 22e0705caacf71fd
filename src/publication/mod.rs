/*!
 * Publication: the state machine over the revision store and the graph
 * algorithms it depends on.
 *
 * - `walker`: cascading actions over the relation graph, relation plans
 * - `service`: publish, unpublish and translate operations
 * - `published`: the read path over published snapshots
 */

pub mod published;
pub mod service;
pub mod walker;

pub use published::PublishedReader;
pub use service::PublicationService;
pub use walker::{FnAction, GraphWalker, NodeAction, PlannedRelation, RelationPlan};
