//! Command entity capability set.
//!
//! The engine never knows how an individual command executes or what its
//! discovery payload looks like; it only drives entities through this trait.

use std::any::Any;

use async_trait::async_trait;

use crate::command::{CommandId, CommandType};
use crate::error::BusResult;

/// A registered, publishable command.
///
/// Implementations are shared as `Arc<dyn CommandEntity>` between the
/// registry and the publish cycle, so identifier changes go through `&self`.
#[async_trait]
pub trait CommandEntity: Send + Sync {
    /// Current identifier.
    fn id(&self) -> CommandId;

    /// Replace the identifier.
    fn set_id(&self, id: CommandId);

    /// Human readable name.
    fn name(&self) -> String;

    /// Command kind.
    fn command_type(&self) -> CommandType;

    /// Topic the bus gateway subscribes to for invocations of this command.
    fn command_topic(&self) -> String;

    /// Publish (or refresh) the autodiscovery configuration.
    async fn publish_autodiscovery(&self) -> BusResult<()>;

    /// Remove the autodiscovery configuration from the hub.
    async fn unpublish_autodiscovery(&self) -> BusResult<()>;

    /// Forget any locally cached autodiscovery configuration.
    fn clear_autodiscovery_cache(&self);

    /// Offer the entity a chance to publish its state.
    ///
    /// With `force == false` the entity decides itself whether the value is
    /// due; with `force == true` it must publish.
    async fn publish_state(&self, force: bool) -> BusResult<()>;

    /// Get this entity as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;
}
