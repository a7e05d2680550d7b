//! Agent configuration.
//!
//! Loaded from an optional JSON file, then overridden from the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hostbridge_commands::EngineConfig;
use hostbridge_mqtt::MqttConfig;

/// Environment variables read at startup.
pub mod env_vars {
    pub const MQTT_BROKER: &str = "HOSTBRIDGE_MQTT_BROKER";
    pub const MQTT_PORT: &str = "HOSTBRIDGE_MQTT_PORT";
    pub const MQTT_USERNAME: &str = "HOSTBRIDGE_MQTT_USERNAME";
    pub const MQTT_PASSWORD: &str = "HOSTBRIDGE_MQTT_PASSWORD";
    pub const DEVICE_NAME: &str = "HOSTBRIDGE_DEVICE_NAME";
    pub const COMMANDS_FILE: &str = "HOSTBRIDGE_COMMANDS_FILE";
    pub const LOG_JSON: &str = "HOSTBRIDGE_LOG_JSON";
}

/// Default location of the stored command list.
pub const DEFAULT_COMMANDS_FILE: &str = "commands.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Where the configured commands are stored.
    #[serde(default = "default_commands_file")]
    pub commands_file: PathBuf,
}

fn default_commands_file() -> PathBuf {
    PathBuf::from(DEFAULT_COMMANDS_FILE)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            engine: EngineConfig::default(),
            commands_file: default_commands_file(),
        }
    }
}

impl AgentConfig {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, keyed by the names in [`env_vars`].
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(broker) = lookup(env_vars::MQTT_BROKER) {
            self.mqtt.broker = broker;
        }
        if let Some(port) = lookup(env_vars::MQTT_PORT) {
            self.mqtt.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", env_vars::MQTT_PORT, port))?;
        }
        if let Some(username) = lookup(env_vars::MQTT_USERNAME) {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup(env_vars::MQTT_PASSWORD) {
            self.mqtt.password = Some(password);
        }
        if let Some(device_name) = lookup(env_vars::DEVICE_NAME) {
            self.mqtt.device_name = device_name;
        }
        if let Some(file) = lookup(env_vars::COMMANDS_FILE) {
            self.commands_file = PathBuf::from(file);
        }
        Ok(())
    }
}
