//! Reconciliation of a desired command list against the registry.
//!
//! Applies adds, updates and removals while the publish cycle is paused, so
//! the bus never observes a half-applied configuration.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bus::BusGateway;
use crate::command::CommandSpec;
use crate::convert::CommandFactory;
use crate::entity::CommandEntity;
use crate::error::Result;
use crate::registry::{CommandRegistry, CycleState};
use crate::store::CommandStore;

/// Applies desired-state changes to the registry and the bus.
pub struct Reconciler {
    registry: Arc<CommandRegistry>,
    state: Arc<CycleState>,
    gateway: Arc<dyn BusGateway>,
    factory: Arc<dyn CommandFactory>,
    store: Arc<dyn CommandStore>,
    /// Serialises overlapping apply calls
    apply_lock: Mutex<()>,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        registry: Arc<CommandRegistry>,
        state: Arc<CycleState>,
        gateway: Arc<dyn BusGateway>,
        factory: Arc<dyn CommandFactory>,
        store: Arc<dyn CommandStore>,
    ) -> Self {
        Self {
            registry,
            state,
            gateway,
            factory,
            store,
            apply_lock: Mutex::new(()),
        }
    }

    /// Apply a desired command list plus explicit removals.
    ///
    /// Returns `false` if any step failed; the registry then keeps whatever
    /// was applied up to that point and the cycle is resumed regardless.
    pub async fn apply_desired_state(
        &self,
        desired: &[CommandSpec],
        removals: &[CommandSpec],
    ) -> bool {
        let _serial = self.apply_lock.lock().await;
        self.apply_locked(desired, removals).await
    }

    /// Apply a desired command list, removing registered commands it no longer contains.
    pub async fn process_received_desired_state(&self, desired: &[CommandSpec]) -> bool {
        if desired.is_empty() {
            tracing::warn!("Received an empty command list, ignoring");
            return false;
        }

        let _serial = self.apply_lock.lock().await;

        let desired_ids: HashSet<&str> = desired.iter().filter_map(|s| s.id()).collect();
        let removals: Vec<CommandSpec> = self
            .registry
            .snapshot()
            .await
            .iter()
            .filter(|c| !desired_ids.contains(c.id().as_str()))
            .filter_map(|c| self.factory.to_spec(c.as_ref()))
            .collect();

        self.apply_locked(desired, &removals).await
    }

    async fn apply_locked(&self, desired: &[CommandSpec], removals: &[CommandSpec]) -> bool {
        let _pause = self.state.pause_scoped();

        match self.apply_steps(desired, removals).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Error while applying command changes: {}", e);
                false
            }
        }
    }

    async fn apply_steps(&self, desired: &[CommandSpec], removals: &[CommandSpec]) -> Result<()> {
        if !removals.is_empty() {
            let removed = self.remove_commands(removals).await?;
            tracing::info!("Removed {} command(s)", removed);
        }

        let mut added = 0usize;
        let mut updated = 0usize;

        for spec in desired {
            let Some(command) = self.factory.to_entity(spec) else {
                tracing::warn!("Skipping malformed command '{}'", spec.name);
                continue;
            };

            let id = command.id();
            if let Some(owner) = self
                .registry
                .topic_owner(&command.command_topic())
                .await
                .filter(|owner| *owner != id)
            {
                tracing::warn!(
                    "Skipping command '{}': topic {} already belongs to command {}",
                    spec.name,
                    command.command_topic(),
                    owner
                );
                continue;
            }

            match self.registry.position(&command.id()).await {
                None => {
                    self.add_command(command).await?;
                    added += 1;
                }
                Some(index) => {
                    self.update_command(index, command).await?;
                    updated += 1;
                }
            }
        }

        if added > 0 || updated > 0 {
            tracing::info!("Added {} and updated {} command(s)", added, updated);
        }

        self.gateway.announce_availability().await?;

        self.persist().await
    }

    async fn remove_commands(&self, removals: &[CommandSpec]) -> Result<usize> {
        let mut removed = 0usize;

        for spec in removals {
            let Some(command) = self.factory.to_entity(spec) else {
                tracing::warn!("Skipping malformed removal '{}'", spec.name);
                continue;
            };
            let id = command.id();

            command.unpublish_autodiscovery().await?;
            self.gateway.unsubscribe(command.as_ref()).await?;
            removed += self.registry.remove_by_id(&id).await;
            command.clear_autodiscovery_cache();

            let mut ledger = self.state.ledger().await;
            ledger.mark_unpublished(&id);
            ledger.mark_unsubscribed(&id);
        }

        Ok(removed)
    }

    async fn add_command(&self, command: Arc<dyn CommandEntity>) -> Result<()> {
        let id = command.id();
        tracing::debug!("Adding command '{}' ({})", command.name(), id);

        self.registry.push(Arc::clone(&command)).await;

        self.gateway.subscribe(command.as_ref()).await?;
        self.state.ledger().await.mark_subscribed(&id);

        command.publish_autodiscovery().await?;
        self.state.ledger().await.mark_published(&id);

        command.publish_state(true).await?;
        Ok(())
    }

    async fn update_command(&self, index: usize, command: Arc<dyn CommandEntity>) -> Result<()> {
        let id = command.id();
        let previous = self.registry.replace_at(index, Arc::clone(&command)).await;

        // Any change of name or entity type moves the entity to new topics
        if let Some(old) = previous.filter(|old| {
            old.name() != command.name() || old.command_topic() != command.command_topic()
        }) {
            tracing::debug!(
                "Command {} moved from {} to {}",
                id,
                old.command_topic(),
                command.command_topic()
            );

            old.unpublish_autodiscovery().await?;
            self.gateway.unsubscribe(old.as_ref()).await?;
            old.clear_autodiscovery_cache();
            {
                let mut ledger = self.state.ledger().await;
                ledger.mark_unpublished(&id);
                ledger.mark_unsubscribed(&id);
            }

            self.gateway.subscribe(command.as_ref()).await?;
            self.state.ledger().await.mark_subscribed(&id);
        } else {
            tracing::debug!("Updating command '{}' ({})", command.name(), id);
        }

        command.publish_autodiscovery().await?;
        self.state.ledger().await.mark_published(&id);

        command.publish_state(true).await?;
        Ok(())
    }

    /// Persist the registry through the store.
    pub async fn persist(&self) -> Result<()> {
        let specs: Vec<CommandSpec> = self
            .registry
            .snapshot()
            .await
            .iter()
            .filter_map(|c| self.factory.to_spec(c.as_ref()))
            .collect();

        self.store.persist(&specs).await?;
        Ok(())
    }
}
