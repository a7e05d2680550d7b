//! Publish cycle.
//!
//! A single background task that periodically announces availability,
//! (re)publishes autodiscovery, establishes subscriptions and offers every
//! command the chance to publish its state. All bus calls are awaited in
//! sequence; command N+1 is never touched before command N completes.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::bus::{BusGateway, BusStatus};
use crate::config::EngineConfig;
use crate::error::BusResult;
use crate::registry::{CommandRegistry, CycleState};

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Skipped, the pause gate is closed
    Paused,
    /// Skipped, the bus is not connected
    Disconnected,
    /// Skipped, there is nothing to publish
    Empty,
    /// States were offered; `announced` tells whether the throttled block ran
    Published { announced: bool },
}

/// The periodic publisher.
#[derive(Clone)]
pub struct PublishCycle {
    config: EngineConfig,
    registry: Arc<CommandRegistry>,
    state: Arc<CycleState>,
    gateway: Arc<dyn BusGateway>,
    wakeup: Arc<Notify>,
}

impl PublishCycle {
    /// Create a new publish cycle.
    pub fn new(
        config: EngineConfig,
        registry: Arc<CommandRegistry>,
        state: Arc<CycleState>,
        gateway: Arc<dyn BusGateway>,
    ) -> Self {
        Self {
            config,
            registry,
            state,
            gateway,
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Wake a sleeping loop so it re-checks the `active` flag.
    pub fn wake(&self) {
        self.wakeup.notify_one();
    }

    /// Whether the cycle may touch the bus right now.
    fn can_proceed(&self) -> bool {
        !self.state.is_paused() && self.gateway.status() == BusStatus::Connected
    }

    /// Run until the engine is deactivated.
    pub async fn run(self) {
        while self.state.is_active() && self.gateway.status().is_transitional() {
            tokio::time::sleep(self.config.connect_poll()).await;
        }

        tracing::info!(
            "Publish cycle started (bus {})",
            self.gateway.status()
        );

        let mut first_run = true;
        while self.state.is_active() {
            let delay = self.config.delay_for(first_run);
            first_run = false;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.wakeup.notified() => {}
            }

            if !self.state.is_active() {
                break;
            }

            match self.run_iteration().await {
                Ok(outcome) => tracing::trace!("Publish cycle iteration: {:?}", outcome),
                Err(e) => tracing::error!("Error while publishing commands: {}", e),
            }
        }

        tracing::info!("Publish cycle stopped");
    }

    /// Execute one iteration of the cycle.
    pub async fn run_iteration(&self) -> BusResult<CycleOutcome> {
        if self.state.is_paused() {
            return Ok(CycleOutcome::Paused);
        }

        if self.gateway.status() != BusStatus::Connected {
            return Ok(CycleOutcome::Disconnected);
        }

        if self.registry.is_empty().await {
            return Ok(CycleOutcome::Empty);
        }

        let commands = self.registry.snapshot().await;
        let now = Instant::now();
        let mut announced = false;

        if self
            .state
            .announce_due(now, self.config.announce_interval())
            .await
        {
            self.gateway.announce_availability().await?;

            for command in &commands {
                if !self.can_proceed() {
                    break;
                }
                command.publish_autodiscovery().await?;
                self.state.ledger().await.mark_published(&command.id());
            }

            if !self.state.is_subscribed() {
                let mut complete = true;
                for command in &commands {
                    if !self.can_proceed() {
                        complete = false;
                        break;
                    }
                    let id = command.id();
                    if self.state.ledger().await.is_subscribed(&id) {
                        continue;
                    }
                    self.gateway.subscribe(command.as_ref()).await?;
                    self.state.ledger().await.mark_subscribed(&id);
                }
                // An interrupted pass is resumed on the next announce
                if complete {
                    self.state.set_subscribed(true);
                }
            }

            self.state.set_last_announce(Some(now)).await;
            announced = true;
        }

        for command in &commands {
            if !self.can_proceed() {
                break;
            }
            command.publish_state(false).await?;
        }

        Ok(CycleOutcome::Published { announced })
    }

    /// Unpublish and unsubscribe every command, keeping them registered.
    ///
    /// Only commands recorded as published/subscribed cause bus calls, so
    /// a second call in a row only clears local caches.
    pub async fn unpublish_all(&self) -> BusResult<()> {
        let commands = self.registry.snapshot().await;

        for command in &commands {
            let id = command.id();
            let (published, subscribed) = {
                let ledger = self.state.ledger().await;
                (ledger.is_published(&id), ledger.is_subscribed(&id))
            };

            if published {
                command.unpublish_autodiscovery().await?;
                self.state.ledger().await.mark_unpublished(&id);
            }
            if subscribed {
                self.gateway.unsubscribe(command.as_ref()).await?;
                self.state.ledger().await.mark_unsubscribed(&id);
            }
            command.clear_autodiscovery_cache();
        }

        self.state.set_last_announce(None).await;
        self.state.set_subscribed(false);

        tracing::debug!("Unpublished {} command(s)", commands.len());
        Ok(())
    }
}
