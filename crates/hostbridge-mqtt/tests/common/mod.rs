//! In-memory broker stand-in for the MQTT collaborator tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use hostbridge_commands::{BusGateway, BusResult, BusStatus, CommandEntity};
use hostbridge_mqtt::{DiscoveryContext, Publisher};

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Records publishes and subscriptions instead of talking to a broker.
#[derive(Default)]
pub struct RecordingBroker {
    messages: Mutex<Vec<Message>>,
    subscriptions: Mutex<Vec<String>>,
}

impl RecordingBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

#[async_trait]
impl Publisher for RecordingBroker {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> BusResult<()> {
        self.messages.lock().push(Message {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }
}

#[async_trait]
impl BusGateway for RecordingBroker {
    fn status(&self) -> BusStatus {
        BusStatus::Connected
    }

    async fn announce_availability(&self) -> BusResult<()> {
        let topic = context().availability_topic();
        self.publish(&topic, "online".to_string(), true).await
    }

    async fn subscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        self.subscriptions.lock().push(command.command_topic());
        Ok(())
    }

    async fn unsubscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        let topic = command.command_topic();
        self.subscriptions.lock().retain(|t| *t != topic);
        Ok(())
    }
}

/// Device context used by every test.
pub fn context() -> DiscoveryContext {
    DiscoveryContext::new("homeassistant", "desk", true)
}
