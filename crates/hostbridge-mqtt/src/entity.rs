//! Home Assistant command entity.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use hostbridge_commands::{BusResult, CommandEntity, CommandId, CommandSpec, CommandType};

use crate::discovery::{DiscoveryContext, PAYLOAD_OFF};
use crate::publisher::Publisher;

/// An unchanged state is republished after this long.
pub const STATE_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// A command exposed to Home Assistant as a button or switch.
pub struct HassCommand {
    spec: RwLock<CommandSpec>,
    context: Arc<DiscoveryContext>,
    publisher: Arc<dyn Publisher>,
    /// Serialised discovery payload
    discovery_cache: Mutex<Option<String>>,
    last_state: Mutex<Option<(String, Instant)>>,
}

impl HassCommand {
    /// Create a command. The spec is expected to carry an identifier.
    pub fn new(
        spec: CommandSpec,
        context: Arc<DiscoveryContext>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            spec: RwLock::new(spec),
            context,
            publisher,
            discovery_cache: Mutex::new(None),
            last_state: Mutex::new(None),
        }
    }

    /// Current configuration.
    pub fn spec(&self) -> CommandSpec {
        self.spec.read().clone()
    }

    /// Topic the discovery config is published to.
    pub fn config_topic(&self) -> String {
        self.context.topics(&self.spec.read()).config
    }

    /// Topic the state is published to.
    pub fn state_topic(&self) -> String {
        self.context.topics(&self.spec.read()).state
    }

    /// Commands run fire-and-forget on the host, so they always rest in `OFF`.
    fn current_state(&self) -> &'static str {
        PAYLOAD_OFF
    }

    fn discovery_payload(&self) -> BusResult<String> {
        let mut cache = self.discovery_cache.lock();
        if let Some(payload) = cache.as_ref() {
            return Ok(payload.clone());
        }

        let payload = serde_json::to_string(&self.context.payload(&self.spec.read()))?;
        *cache = Some(payload.clone());
        Ok(payload)
    }

    fn state_due(&self, state: &str, now: Instant) -> bool {
        match self.last_state.lock().as_ref() {
            None => true,
            Some((last, at)) => {
                last != state || now.saturating_duration_since(*at) >= STATE_REFRESH_INTERVAL
            }
        }
    }
}

#[async_trait]
impl CommandEntity for HassCommand {
    fn id(&self) -> CommandId {
        self.spec.read().id.clone().unwrap_or_default()
    }

    fn set_id(&self, id: CommandId) {
        self.spec.write().id = Some(id);
        // unique_id is part of the payload
        self.clear_autodiscovery_cache();
    }

    fn name(&self) -> String {
        self.spec.read().name.clone()
    }

    fn command_type(&self) -> CommandType {
        self.spec.read().command_type
    }

    fn command_topic(&self) -> String {
        self.context.topics(&self.spec.read()).command
    }

    async fn publish_autodiscovery(&self) -> BusResult<()> {
        let payload = self.discovery_payload()?;
        self.publisher
            .publish(&self.config_topic(), payload, self.context.retain)
            .await
    }

    async fn unpublish_autodiscovery(&self) -> BusResult<()> {
        // An empty retained config removes the entity from the hub
        self.publisher
            .publish(&self.config_topic(), String::new(), true)
            .await
    }

    fn clear_autodiscovery_cache(&self) {
        *self.discovery_cache.lock() = None;
    }

    async fn publish_state(&self, force: bool) -> BusResult<()> {
        let state = self.current_state();
        let now = Instant::now();

        if !force && !self.state_due(state, now) {
            return Ok(());
        }

        self.publisher
            .publish(&self.state_topic(), state.to_string(), false)
            .await?;
        *self.last_state.lock() = Some((state.to_string(), now));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
