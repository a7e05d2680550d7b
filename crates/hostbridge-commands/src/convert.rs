//! Conversion between configured specs and live entities.

use std::sync::Arc;

use crate::command::CommandSpec;
use crate::entity::CommandEntity;

/// Builds entities from specs and back.
pub trait CommandFactory: Send + Sync {
    /// Build an entity, or `None` when the spec is malformed.
    fn to_entity(&self, spec: &CommandSpec) -> Option<Arc<dyn CommandEntity>>;

    /// Recover the spec of an entity, or `None` if the entity is foreign.
    fn to_spec(&self, entity: &dyn CommandEntity) -> Option<CommandSpec>;
}
