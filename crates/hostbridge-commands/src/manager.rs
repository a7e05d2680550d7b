//! Command manager.
//!
//! The single context object owning the registry and cycle state, exposing
//! lifecycle control, reconciliation and the publish cycle to callers.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::bus::BusGateway;
use crate::command::{CommandSpec, CommandType, generate_id};
use crate::config::EngineConfig;
use crate::convert::CommandFactory;
use crate::cycle::PublishCycle;
use crate::entity::CommandEntity;
use crate::error::Result;
use crate::reconciler::Reconciler;
use crate::registry::{CommandRegistry, CycleState};
use crate::store::CommandStore;
use crate::types::describe_command_type;

/// Command manager.
pub struct CommandManager {
    registry: Arc<CommandRegistry>,
    state: Arc<CycleState>,
    factory: Arc<dyn CommandFactory>,
    store: Arc<dyn CommandStore>,
    cycle: PublishCycle,
    reconciler: Arc<Reconciler>,
    task_handle: RwLock<Option<JoinHandle<()>>>,
}

impl CommandManager {
    /// Create a new command manager.
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn BusGateway>,
        factory: Arc<dyn CommandFactory>,
        store: Arc<dyn CommandStore>,
    ) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        let state = Arc::new(CycleState::new());

        let cycle = PublishCycle::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&state),
            Arc::clone(&gateway),
        );
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&state),
            gateway,
            Arc::clone(&factory),
            Arc::clone(&store),
        ));

        Self {
            registry,
            state,
            factory,
            store,
            cycle,
            reconciler,
            task_handle: RwLock::new(None),
        }
    }

    /// Load stored commands into the registry.
    ///
    /// Makes no bus calls; the publish cycle announces them on its next round.
    pub async fn load_stored(&self) -> Result<usize> {
        let specs = self.store.load().await?;
        let mut commands: Vec<Arc<dyn CommandEntity>> = Vec::with_capacity(specs.len());

        for spec in &specs {
            match self.factory.to_entity(spec) {
                Some(command) => {
                    if commands.iter().any(|c| c.id() == command.id()) {
                        tracing::warn!(
                            "Skipping stored command '{}' with duplicate id {}",
                            spec.name,
                            command.id()
                        );
                        continue;
                    }
                    if commands
                        .iter()
                        .any(|c| c.command_topic() == command.command_topic())
                    {
                        tracing::warn!(
                            "Skipping stored command '{}': topic {} is already taken",
                            spec.name,
                            command.command_topic()
                        );
                        continue;
                    }
                    commands.push(command);
                }
                None => tracing::warn!("Skipping malformed stored command '{}'", spec.name),
            }
        }

        let loaded = commands.len();
        self.registry.replace_all(commands).await;

        // Stored specs without an identifier got one on conversion
        if specs.iter().any(|s| s.id().is_none()) {
            self.reconciler.persist().await?;
        }

        tracing::info!("Loaded {} stored command(s)", loaded);
        Ok(loaded)
    }

    /// Start the publish cycle.
    ///
    /// Calling this more than once has no effect while the cycle is running.
    pub async fn initialize(&self) {
        let mut task = self.task_handle.write().await;
        if task.is_some() {
            tracing::warn!("Command manager already initialized");
            return;
        }

        let cycle = self.cycle.clone();
        *task = Some(tokio::spawn(cycle.run()));
        tracing::info!("Command manager initialized");
    }

    /// Permanently stop the publish cycle. Does not wait for it to exit.
    pub fn stop(&self) {
        self.state.deactivate();
        self.cycle.wake();
    }

    /// Stop the publish cycle and wait for the task to finish.
    pub async fn shutdown(&self) {
        self.stop();

        let handle = self.task_handle.write().await.take();
        if let Some(handle) = handle {
            handle.await.ok();
        }
    }

    /// Check if the publish cycle task is running.
    pub async fn is_running(&self) -> bool {
        self.task_handle
            .read()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Temporarily suspend the publish cycle.
    pub fn pause(&self) {
        self.state.set_paused(true);
    }

    /// Resume the publish cycle.
    pub fn resume(&self) {
        self.state.set_paused(false);
    }

    /// Check if the publish cycle is paused.
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Check if any commands are registered.
    pub async fn is_commands_present(&self) -> bool {
        !self.registry.is_empty().await
    }

    /// Specs of all registered commands, in registry order.
    pub async fn commands(&self) -> Vec<CommandSpec> {
        self.registry
            .snapshot()
            .await
            .iter()
            .filter_map(|c| self.factory.to_spec(c.as_ref()))
            .collect()
    }

    /// Unpublish and unsubscribe every command without removing it.
    pub async fn unpublish_all_commands(&self) -> Result<()> {
        if self.registry.is_empty().await {
            return Ok(());
        }
        self.cycle.unpublish_all().await?;
        Ok(())
    }

    /// Give every command a new identifier and persist the result.
    pub async fn reset_all_identifiers(&self) -> Result<()> {
        let commands = self.registry.snapshot().await;
        for command in &commands {
            let old_id = command.id();
            let new_id = generate_id();
            command.set_id(new_id.clone());
            self.state.ledger().await.rekey(&old_id, &new_id);
        }

        self.reconciler.persist().await?;
        tracing::info!("Reset identifiers of {} command(s)", commands.len());
        Ok(())
    }

    /// Apply a desired command list plus explicit removals.
    pub async fn apply_desired_state(
        &self,
        desired: &[CommandSpec],
        removals: &[CommandSpec],
    ) -> bool {
        self.reconciler.apply_desired_state(desired, removals).await
    }

    /// Apply a received command list in the background.
    ///
    /// Registered commands absent from `desired` are removed.
    pub fn process_received_desired_state(&self, desired: Vec<CommandSpec>) -> JoinHandle<bool> {
        let reconciler = Arc::clone(&self.reconciler);
        tokio::spawn(async move { reconciler.process_received_desired_state(&desired).await })
    }

    /// Help text for a command kind.
    pub fn describe_command_type(&self, command_type: &CommandType) -> &'static str {
        describe_command_type(command_type)
    }

    /// The publish cycle, for driving single iterations.
    pub fn cycle(&self) -> &PublishCycle {
        &self.cycle
    }
}
