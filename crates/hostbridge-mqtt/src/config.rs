//! MQTT connection and discovery configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MQTT QoS level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Qos {
    AtMostOnce = 0,
    #[default]
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// MQTT gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address.
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client ID.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Back-off after an event loop error, in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// QoS for publishes and subscriptions.
    #[serde(default)]
    pub qos: Qos,

    /// Home Assistant discovery prefix.
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Device name this host is announced under.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Publish discovery configs as retained messages.
    #[serde(default = "default_retain_discovery")]
    pub retain_discovery: bool,
}

fn default_broker() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    format!("hostbridge_{}", uuid::Uuid::new_v4().simple())
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_interval() -> u64 {
    5000
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_device_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "hostbridge".to_string())
}

fn default_retain_discovery() -> bool {
    true
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self::new(default_broker())
    }
}

impl MqttConfig {
    /// Create a new MQTT configuration.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            reconnect_interval_ms: default_reconnect_interval(),
            qos: Qos::default(),
            discovery_prefix: default_discovery_prefix(),
            device_name: default_device_name(),
            retain_discovery: default_retain_discovery(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the device name.
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    /// Set the discovery prefix.
    pub fn with_discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_prefix = prefix.into();
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
