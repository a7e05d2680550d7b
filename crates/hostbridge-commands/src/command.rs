//! Command data structures.
//!
//! Defines the configuration form of a host command and the kinds the agent
//! knows how to expose.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique command identifier.
pub type CommandId = String;

/// Generate a fresh command identifier.
pub fn generate_id() -> CommandId {
    Uuid::new_v4().to_string()
}

/// Supported command kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Run a shell command line
    Custom,
    /// Run a command line through the configured custom executor
    CustomExecutor,
    /// Run a PowerShell command or script
    Powershell,
    /// Shut the host down
    Shutdown,
    /// Restart the host
    Restart,
    /// Hibernate the host
    Hibernate,
    /// Put the host to sleep
    Sleep,
    /// Lock the current session
    Lock,
    /// Log off the current session
    LogOff,
    /// Simulate a single key press
    Key,
    /// Simulate a sequence of key presses
    MultipleKeys,
    /// Toggle media playback
    MediaPlayPause,
    /// Skip to the next media track
    MediaNext,
    /// Go back to the previous media track
    MediaPrevious,
    /// Raise the volume one step
    MediaVolumeUp,
    /// Lower the volume one step
    MediaVolumeDown,
    /// Toggle mute
    MediaMute,
    /// Open a URL in the default browser
    LaunchUrl,
    /// Put the monitors to sleep
    MonitorSleep,
    /// Wake the monitors
    MonitorWake,
    /// Set the master volume to a fixed level
    SetVolume,
    /// Bring a window to the foreground
    SendWindowToFront,
    /// Force every sensor to publish its state
    PublishAllSensors,
    /// Unrecognised tag (e.g. written by a newer agent version)
    #[serde(other)]
    Unknown,
}

impl CommandType {
    /// All supported kinds, in display order.
    pub fn all() -> &'static [CommandType] {
        &[
            CommandType::Custom,
            CommandType::CustomExecutor,
            CommandType::Powershell,
            CommandType::Shutdown,
            CommandType::Restart,
            CommandType::Hibernate,
            CommandType::Sleep,
            CommandType::Lock,
            CommandType::LogOff,
            CommandType::Key,
            CommandType::MultipleKeys,
            CommandType::MediaPlayPause,
            CommandType::MediaNext,
            CommandType::MediaPrevious,
            CommandType::MediaVolumeUp,
            CommandType::MediaVolumeDown,
            CommandType::MediaMute,
            CommandType::LaunchUrl,
            CommandType::MonitorSleep,
            CommandType::MonitorWake,
            CommandType::SetVolume,
            CommandType::SendWindowToFront,
            CommandType::PublishAllSensors,
        ]
    }

    /// Get the type tag as used in configuration files.
    pub fn type_name(&self) -> &'static str {
        match self {
            CommandType::Custom => "custom",
            CommandType::CustomExecutor => "custom_executor",
            CommandType::Powershell => "powershell",
            CommandType::Shutdown => "shutdown",
            CommandType::Restart => "restart",
            CommandType::Hibernate => "hibernate",
            CommandType::Sleep => "sleep",
            CommandType::Lock => "lock",
            CommandType::LogOff => "log_off",
            CommandType::Key => "key",
            CommandType::MultipleKeys => "multiple_keys",
            CommandType::MediaPlayPause => "media_play_pause",
            CommandType::MediaNext => "media_next",
            CommandType::MediaPrevious => "media_previous",
            CommandType::MediaVolumeUp => "media_volume_up",
            CommandType::MediaVolumeDown => "media_volume_down",
            CommandType::MediaMute => "media_mute",
            CommandType::LaunchUrl => "launch_url",
            CommandType::MonitorSleep => "monitor_sleep",
            CommandType::MonitorWake => "monitor_wake",
            CommandType::SetVolume => "set_volume",
            CommandType::SendWindowToFront => "send_window_to_front",
            CommandType::PublishAllSensors => "publish_all_sensors",
            CommandType::Unknown => "unknown",
        }
    }

    /// Whether the kind carries its payload in the `command` field.
    pub fn requires_command_line(&self) -> bool {
        matches!(
            self,
            CommandType::Custom
                | CommandType::CustomExecutor
                | CommandType::Powershell
                | CommandType::LaunchUrl
                | CommandType::SetVolume
                | CommandType::SendWindowToFront
        )
    }

    /// Whether the kind carries its payload in the `keys` field.
    pub fn requires_keys(&self) -> bool {
        matches!(self, CommandType::Key | CommandType::MultipleKeys)
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// How the hub renders a command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Stateless push button
    #[default]
    Button,
    /// On/off switch
    Switch,
}

impl EntityType {
    /// Discovery component name for this entity type.
    pub fn component(&self) -> &'static str {
        match self {
            EntityType::Button => "button",
            EntityType::Switch => "switch",
        }
    }
}

/// Configured command, as stored on disk and received from configuration changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    /// Stable identifier (None = generate on registration)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
    /// Unique, human readable name
    pub name: String,
    /// Name shown by the hub (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    /// Command kind
    #[serde(rename = "type")]
    pub command_type: CommandType,
    /// Hub entity type
    #[serde(default)]
    pub entity_type: EntityType,
    /// Command line, script, URL or value, depending on the kind
    #[serde(default)]
    pub command: String,
    /// Key codes for key simulation kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Run with a restricted token where the platform supports it
    #[serde(default)]
    pub run_as_low_integrity: bool,
}

impl CommandSpec {
    /// Create a new spec without an identifier.
    pub fn new(name: impl Into<String>, command_type: CommandType) -> Self {
        Self {
            id: None,
            name: name.into(),
            friendly_name: None,
            command_type,
            entity_type: EntityType::default(),
            command: String::new(),
            keys: Vec::new(),
            run_as_low_integrity: false,
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<CommandId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the command payload.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the key codes.
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    /// Set the entity type.
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = entity_type;
        self
    }

    /// Set the friendly name.
    pub fn with_friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// Identifier, treating an empty string as absent.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Name shown by the hub.
    pub fn display_name(&self) -> &str {
        self.friendly_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// Check the type-specific configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }

        if self.command_type == CommandType::Unknown {
            return Err(format!("'{}' has an unknown command type", self.name));
        }

        if self.command_type.requires_command_line() && self.command.trim().is_empty() {
            return Err(format!(
                "'{}' ({}) requires a command",
                self.name, self.command_type
            ));
        }

        if self.command_type.requires_keys() && self.keys.is_empty() {
            return Err(format!(
                "'{}' ({}) requires at least one key",
                self.name, self.command_type
            ));
        }

        if self.command_type == CommandType::SetVolume {
            match self.command.trim().parse::<u8>() {
                Ok(level) if level <= 100 => {}
                _ => {
                    return Err(format!(
                        "'{}' volume must be between 0 and 100, got '{}'",
                        self.name, self.command
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_tags() {
        let json = serde_json::to_string(&CommandType::MediaPlayPause).unwrap();
        assert_eq!(json, "\"media_play_pause\"");
        assert_eq!(CommandType::MediaPlayPause.to_string(), "media_play_pause");
    }

    #[test]
    fn test_unknown_tag_is_tolerated() {
        let ty: CommandType = serde_json::from_str("\"set_audio_output\"").unwrap();
        assert_eq!(ty, CommandType::Unknown);
        assert!(!CommandType::all().contains(&CommandType::Unknown));
    }

    #[test]
    fn test_spec_deserialize_defaults() {
        let spec: CommandSpec =
            serde_json::from_str(r#"{"name": "Shutdown", "type": "shutdown"}"#).unwrap();

        assert_eq!(spec.id, None);
        assert_eq!(spec.command_type, CommandType::Shutdown);
        assert_eq!(spec.entity_type, EntityType::Button);
        assert!(spec.command.is_empty());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_id_treated_as_absent() {
        let spec = CommandSpec::new("Lock", CommandType::Lock).with_id("  ");
        assert_eq!(spec.id(), None);

        let spec = CommandSpec::new("Lock", CommandType::Lock).with_id("1");
        assert_eq!(spec.id(), Some("1"));
    }

    #[test]
    fn test_validate_type_specific() {
        assert!(CommandSpec::new("", CommandType::Lock).validate().is_err());
        assert!(CommandSpec::new("Run", CommandType::Custom).validate().is_err());
        assert!(
            CommandSpec::new("Run", CommandType::Custom)
                .with_command("echo hi")
                .validate()
                .is_ok()
        );
        assert!(CommandSpec::new("Keys", CommandType::Key).validate().is_err());
        assert!(
            CommandSpec::new("Vol", CommandType::SetVolume)
                .with_command("150")
                .validate()
                .is_err()
        );
        assert!(
            CommandSpec::new("Vol", CommandType::SetVolume)
                .with_command("40")
                .validate()
                .is_ok()
        );
        assert!(CommandSpec::new("What", CommandType::Unknown).validate().is_err());
    }

    #[test]
    fn test_display_name() {
        let spec = CommandSpec::new("lock_pc", CommandType::Lock);
        assert_eq!(spec.display_name(), "lock_pc");

        let spec = spec.with_friendly_name("Lock PC");
        assert_eq!(spec.display_name(), "Lock PC");
    }
}
