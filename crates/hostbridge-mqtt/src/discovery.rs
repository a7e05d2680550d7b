//! Home Assistant MQTT discovery payloads and topics.
//!
//! Every command is announced as a `button` or `switch` entity under this
//! host's device:
//!
//! ```text
//! {prefix}/sensor/{device}/availability          online / offline
//! {prefix}/{component}/{device}/{object_id}/config   discovery payload (retained)
//! {prefix}/{component}/{device}/{object_id}/state    ON / OFF
//! {prefix}/{component}/{device}/{object_id}/set      invocations from the hub
//! ```
//!
//! `object_id` is derived from the command name, so a rename moves every topic.

use serde::{Deserialize, Serialize};

use hostbridge_commands::{CommandSpec, EntityType};

use crate::config::MqttConfig;

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";
pub const PAYLOAD_ON: &str = "ON";
pub const PAYLOAD_OFF: &str = "OFF";

const MANUFACTURER: &str = "HostBridge";

/// Lowercase `name`, replacing every non-alphanumeric character with `_`.
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Device block shared by every entity of this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceInfo {
    /// Device block for the named host.
    pub fn for_host(device_name: &str) -> Self {
        Self {
            identifiers: vec![format!("hostbridge_{}", sanitize(device_name))],
            name: device_name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: std::env::consts::OS.to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Where this host's entities live on the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryContext {
    pub prefix: String,
    /// Sanitised device name used in topics
    pub device_id: String,
    pub device: DeviceInfo,
    pub retain: bool,
}

impl DiscoveryContext {
    pub fn new(prefix: impl Into<String>, device_name: &str, retain: bool) -> Self {
        Self {
            prefix: prefix.into(),
            device_id: sanitize(device_name),
            device: DeviceInfo::for_host(device_name),
            retain,
        }
    }

    pub fn from_config(config: &MqttConfig) -> Self {
        Self::new(
            config.discovery_prefix.clone(),
            &config.device_name,
            config.retain_discovery,
        )
    }

    /// Availability topic shared by every entity.
    pub fn availability_topic(&self) -> String {
        format!("{}/sensor/{}/availability", self.prefix, self.device_id)
    }

    /// Topics of a command.
    pub fn topics(&self, spec: &CommandSpec) -> CommandTopics {
        let base = format!(
            "{}/{}/{}/{}",
            self.prefix,
            spec.entity_type.component(),
            self.device_id,
            sanitize(&spec.name)
        );
        CommandTopics {
            config: format!("{base}/config"),
            state: format!("{base}/state"),
            command: format!("{base}/set"),
        }
    }

    /// Build the discovery payload of a command.
    pub fn payload(&self, spec: &CommandSpec) -> DiscoveryPayload {
        let topics = self.topics(spec);
        let id = spec.id().unwrap_or_default();
        let (payload_press, payload_on, payload_off) = match spec.entity_type {
            EntityType::Button => (Some(PAYLOAD_ON.to_string()), None, None),
            EntityType::Switch => (
                None,
                Some(PAYLOAD_ON.to_string()),
                Some(PAYLOAD_OFF.to_string()),
            ),
        };

        DiscoveryPayload {
            name: spec.display_name().to_string(),
            unique_id: format!("{}_{}", self.device_id, id),
            object_id: format!("{}_{}", self.device_id, sanitize(&spec.name)),
            command_topic: topics.command,
            state_topic: topics.state,
            availability_topic: self.availability_topic(),
            payload_available: PAYLOAD_ONLINE.to_string(),
            payload_not_available: PAYLOAD_OFFLINE.to_string(),
            payload_press,
            payload_on,
            payload_off,
            device: self.device.clone(),
        }
    }
}

/// Topics belonging to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopics {
    pub config: String,
    pub state: String,
    pub command: String,
}

/// Discovery config message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub command_topic: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_press: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    pub device: DeviceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_commands::CommandType;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Lock Screen"), "lock_screen");
        assert_eq!(sanitize(" Vol-50% "), "vol_50_");
        assert_eq!(sanitize("abc123"), "abc123");
    }

    #[test]
    fn test_topics() {
        let ctx = DiscoveryContext::new("homeassistant", "Office PC", true);
        let spec = CommandSpec::new("Lock Screen", CommandType::Lock).with_id("42");

        assert_eq!(
            ctx.availability_topic(),
            "homeassistant/sensor/office_pc/availability"
        );
        let topics = ctx.topics(&spec);
        assert_eq!(
            topics.config,
            "homeassistant/button/office_pc/lock_screen/config"
        );
        assert_eq!(topics.state, "homeassistant/button/office_pc/lock_screen/state");
        assert_eq!(topics.command, "homeassistant/button/office_pc/lock_screen/set");

        let switch = spec.with_entity_type(EntityType::Switch);
        assert!(ctx.topics(&switch).config.starts_with("homeassistant/switch/"));
    }

    #[test]
    fn test_payload() {
        let ctx = DiscoveryContext::new("ha", "desk", false);
        let spec = CommandSpec::new("Mute", CommandType::MediaMute)
            .with_id("7")
            .with_friendly_name("Mute Audio");

        let payload = ctx.payload(&spec);
        assert_eq!(payload.name, "Mute Audio");
        assert_eq!(payload.unique_id, "desk_7");
        assert_eq!(payload.payload_press.as_deref(), Some("ON"));
        assert!(payload.payload_on.is_none());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["availability_topic"], "ha/sensor/desk/availability");
        assert_eq!(json["device"]["identifiers"][0], "hostbridge_desk");
        assert!(json.get("payload_off").is_none());
    }
}
