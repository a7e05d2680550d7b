//! Conversion between stored command specs and live Home Assistant commands.

use std::sync::Arc;

use hostbridge_commands::{generate_id, CommandEntity, CommandFactory, CommandSpec};

use crate::discovery::DiscoveryContext;
use crate::entity::HassCommand;
use crate::publisher::Publisher;

/// Builds `HassCommand`s sharing one publisher and device context.
pub struct HassCommandFactory {
    context: Arc<DiscoveryContext>,
    publisher: Arc<dyn Publisher>,
}

impl HassCommandFactory {
    pub fn new(context: DiscoveryContext, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            context: Arc::new(context),
            publisher,
        }
    }
}

impl CommandFactory for HassCommandFactory {
    fn to_entity(&self, spec: &CommandSpec) -> Option<Arc<dyn CommandEntity>> {
        if let Err(e) = spec.validate() {
            tracing::debug!("Rejected command spec: {}", e);
            return None;
        }

        let mut spec = spec.clone();
        if spec.id().is_none() {
            spec.id = Some(generate_id());
        }

        Some(Arc::new(HassCommand::new(
            spec,
            Arc::clone(&self.context),
            Arc::clone(&self.publisher),
        )))
    }

    fn to_spec(&self, entity: &dyn CommandEntity) -> Option<CommandSpec> {
        entity
            .as_any()
            .downcast_ref::<HassCommand>()
            .map(HassCommand::spec)
    }
}
