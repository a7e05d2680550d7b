//! Help text for the supported command kinds.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::command::CommandType;

/// Returned for kinds that have no entry in the table.
pub const UNKNOWN_TYPE_DESCRIPTION: &str =
    "Unknown command type (the agent may still be starting up).";

static TYPE_INFO: Lazy<HashMap<CommandType, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            CommandType::Custom,
            "Runs the provided command line through the system shell.",
        ),
        (
            CommandType::CustomExecutor,
            "Runs the provided command line through the configured custom executor.",
        ),
        (
            CommandType::Powershell,
            "Runs the provided PowerShell command, or the script if a .ps1 path is given.",
        ),
        (CommandType::Shutdown, "Shuts down the machine."),
        (CommandType::Restart, "Restarts the machine."),
        (CommandType::Hibernate, "Hibernates the machine."),
        (CommandType::Sleep, "Puts the machine to sleep."),
        (CommandType::Lock, "Locks the current session."),
        (CommandType::LogOff, "Logs off the current session."),
        (
            CommandType::Key,
            "Simulates a single key press. Use the key code, e.g. 'VOLUME_MUTE'.",
        ),
        (
            CommandType::MultipleKeys,
            "Simulates a sequence of key presses, one key code per entry.",
        ),
        (CommandType::MediaPlayPause, "Toggles media playback."),
        (CommandType::MediaNext, "Skips to the next media track."),
        (CommandType::MediaPrevious, "Returns to the previous media track."),
        (CommandType::MediaVolumeUp, "Raises the volume by one step."),
        (CommandType::MediaVolumeDown, "Lowers the volume by one step."),
        (CommandType::MediaMute, "Toggles mute."),
        (
            CommandType::LaunchUrl,
            "Opens the provided URL in the default browser.",
        ),
        (CommandType::MonitorSleep, "Puts all monitors to sleep."),
        (
            CommandType::MonitorWake,
            "Wakes the monitors by simulating a harmless key press.",
        ),
        (
            CommandType::SetVolume,
            "Sets the master volume to the provided level (0-100).",
        ),
        (
            CommandType::SendWindowToFront,
            "Brings the window of the provided process to the foreground.",
        ),
        (
            CommandType::PublishAllSensors,
            "Forces every sensor to publish its current state.",
        ),
    ])
});

/// Get the help text for a command kind.
pub fn describe_command_type(command_type: &CommandType) -> &'static str {
    TYPE_INFO
        .get(command_type)
        .copied()
        .unwrap_or(UNKNOWN_TYPE_DESCRIPTION)
}
