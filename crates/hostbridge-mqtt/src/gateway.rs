//! rumqttc-backed bus gateway.
//!
//! Owns the broker connection: the last will, the event loop task, the set
//! of subscribed command topics and the fan-out of incoming invocations.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use hostbridge_commands::{BusError, BusGateway, BusResult, BusStatus, CommandEntity};

use crate::config::MqttConfig;
use crate::discovery::{DiscoveryContext, PAYLOAD_OFFLINE, PAYLOAD_ONLINE};
use crate::publisher::Publisher;

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the invocation broadcast.
const INVOCATION_CHANNEL_CAPACITY: usize = 32;

/// How long `disconnect` waits for the event loop to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// A message received on a subscribed command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub topic: String,
    pub payload: String,
}

/// MQTT implementation of `BusGateway`.
pub struct MqttGateway {
    config: MqttConfig,
    context: DiscoveryContext,
    status: Arc<RwLock<BusStatus>>,
    client: RwLock<Option<AsyncClient>>,
    /// Command topics that must be subscribed
    topics: Arc<RwLock<HashSet<String>>>,
    invocations: broadcast::Sender<CommandInvocation>,
    running: Arc<AtomicBool>,
    /// Set while `disconnect` drains the request queue
    closing: Arc<AtomicBool>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MqttGateway {
    /// Create a new, unconnected gateway.
    pub fn new(config: MqttConfig) -> Self {
        let context = DiscoveryContext::from_config(&config);
        let (invocations, _) = broadcast::channel(INVOCATION_CHANNEL_CAPACITY);

        Self {
            config,
            context,
            status: Arc::new(RwLock::new(BusStatus::Disconnected)),
            client: RwLock::new(None),
            topics: Arc::new(RwLock::new(HashSet::new())),
            invocations,
            running: Arc::new(AtomicBool::new(false)),
            closing: Arc::new(AtomicBool::new(false)),
            task_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Topic and device layout used for this host.
    pub fn context(&self) -> &DiscoveryContext {
        &self.context
    }

    /// Receive invocations published on subscribed command topics.
    pub fn invocations(&self) -> broadcast::Receiver<CommandInvocation> {
        self.invocations.subscribe()
    }

    /// Currently tracked command topics.
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Connect to the broker and start the event loop.
    ///
    /// Returns once the client exists; the status turns `Connected` when
    /// the broker acknowledges the session.
    pub async fn connect(&self) -> BusResult<()> {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("MQTT gateway already connected");
            return Ok(());
        }

        *self.status.write() = BusStatus::Connecting;

        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            &self.config.broker,
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_last_will(LastWill::new(
            self.context.availability_topic(),
            PAYLOAD_OFFLINE,
            self.config.qos.into(),
            true,
        ));
        if let (Some(u), Some(p)) = (&self.config.username, &self.config.password) {
            options.set_credentials(u, p);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        *self.client.write() = Some(client.clone());
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            "Connecting to MQTT broker {}:{} as {}",
            self.config.broker,
            self.config.port,
            self.config.client_id
        );

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client,
            EventLoopShared {
                status: Arc::clone(&self.status),
                topics: Arc::clone(&self.topics),
                invocations: self.invocations.clone(),
                running: Arc::clone(&self.running),
                closing: Arc::clone(&self.closing),
                qos: self.config.qos.into(),
                reconnect_interval: self.config.reconnect_interval(),
            },
        ));
        *self.task_handle.lock() = Some(handle);

        Ok(())
    }

    /// Announce `offline` and close the connection.
    ///
    /// The event loop keeps polling until the `offline` publish and the
    /// disconnect request have been written, then stops on its own.
    /// Retained discovery configs stay on the broker.
    pub async fn disconnect(&self) -> BusResult<()> {
        let client = self.client.write().take();

        if let Some(client) = client {
            self.closing.store(true, Ordering::SeqCst);
            if let Err(e) = client
                .publish(
                    self.context.availability_topic(),
                    self.config.qos.into(),
                    true,
                    PAYLOAD_OFFLINE,
                )
                .await
            {
                tracing::warn!("Failed to announce offline: {}", e);
            }
            if let Err(e) = client.disconnect().await {
                tracing::debug!("MQTT disconnect request failed: {}", e);
            }
        }

        let handle = self.task_handle.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("MQTT event loop did not stop in time");
                handle.abort();
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.closing.store(false, Ordering::SeqCst);
        *self.status.write() = BusStatus::Disconnected;
        tracing::info!("Disconnected from MQTT broker");
        Ok(())
    }

    fn client(&self) -> BusResult<AsyncClient> {
        self.client.read().clone().ok_or(BusError::NotConnected)
    }
}

#[async_trait]
impl Publisher for MqttGateway {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> BusResult<()> {
        self.client()?
            .publish(topic, self.config.qos.into(), retain, payload)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}

#[async_trait]
impl BusGateway for MqttGateway {
    fn status(&self) -> BusStatus {
        *self.status.read()
    }

    async fn announce_availability(&self) -> BusResult<()> {
        self.publish(
            &self.context.availability_topic(),
            PAYLOAD_ONLINE.to_string(),
            true,
        )
        .await
    }

    async fn subscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        let topic = command.command_topic();
        self.topics.write().insert(topic.clone());

        // Without a client the topic is picked up on the next ConnAck
        let Some(client) = self.client.read().clone() else {
            tracing::debug!("Deferred subscription to {}", topic);
            return Ok(());
        };

        client
            .subscribe(topic.as_str(), self.config.qos.into())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        tracing::debug!("Subscribed to {}", topic);
        Ok(())
    }

    async fn unsubscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        let topic = command.command_topic();
        self.topics.write().remove(&topic);

        let Some(client) = self.client.read().clone() else {
            return Ok(());
        };

        client
            .unsubscribe(topic.as_str())
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        tracing::debug!("Unsubscribed from {}", topic);
        Ok(())
    }
}

/// State the event loop task shares with the gateway.
struct EventLoopShared {
    status: Arc<RwLock<BusStatus>>,
    topics: Arc<RwLock<HashSet<String>>>,
    invocations: broadcast::Sender<CommandInvocation>,
    running: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    qos: rumqttc::QoS,
    reconnect_interval: Duration,
}

async fn run_event_loop(mut eventloop: EventLoop, client: AsyncClient, shared: EventLoopShared) {
    while shared.running.load(Ordering::SeqCst) {
        match eventloop.poll().await {
            Ok(Event::Incoming(packet)) => handle_packet(packet, &client, &shared),
            // Everything queued before the disconnect request is written by now
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(Event::Outgoing(_)) => {}
            Err(e) => {
                if shared.closing.load(Ordering::SeqCst)
                    || !shared.running.load(Ordering::SeqCst)
                {
                    break;
                }
                tracing::error!("MQTT error: {}", e);
                *shared.status.write() = BusStatus::Disconnected;
                tokio::time::sleep(shared.reconnect_interval).await;
                // The next poll reconnects
                *shared.status.write() = BusStatus::Reconnecting;
            }
        }
    }

    tracing::debug!("MQTT event loop stopped");
}

fn handle_packet(packet: Packet, client: &AsyncClient, shared: &EventLoopShared) {
    match packet {
        Packet::ConnAck(_) => {
            tracing::info!("MQTT connected successfully");
            *shared.status.write() = BusStatus::Connected;

            // Clean sessions drop subscriptions on reconnect.
            // The event loop must not await its own request channel here.
            let topics: Vec<String> = shared.topics.read().iter().cloned().collect();
            for topic in topics {
                if let Err(e) = client.try_subscribe(topic.as_str(), shared.qos) {
                    tracing::warn!("Failed to re-subscribe to {}: {}", topic, e);
                }
            }
        }
        Packet::Publish(publish) => {
            if !shared.topics.read().contains(&publish.topic) {
                return;
            }
            let payload = String::from_utf8_lossy(&publish.payload).into_owned();
            tracing::debug!("Invocation on {}: {}", publish.topic, payload);

            // No receivers is fine
            let _ = shared.invocations.send(CommandInvocation {
                topic: publish.topic,
                payload,
            });
        }
        Packet::Disconnect => {
            *shared.status.write() = BusStatus::Disconnected;
        }
        _ => {}
    }
}
