//! Error types for the command engine.

use thiserror::Error;

/// Result type for bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

/// Message bus error types.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus not connected")]
    NotConnected,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Bus error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Serialization(e.to_string())
    }
}

/// Persistence error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Engine error types.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_offline() -> BusResult<()> {
        Err(BusError::NotConnected)
    }

    fn persist() -> Result<()> {
        Err(StoreError::Serialization("truncated".to_string()).into())
    }

    fn apply_step() -> Result<()> {
        publish_offline()?;
        Ok(())
    }

    #[test]
    fn test_bus_and_store_errors_convert() {
        assert!(matches!(
            apply_step(),
            Err(CommandError::Bus(BusError::NotConnected))
        ));
        assert!(matches!(
            persist(),
            Err(CommandError::Store(StoreError::Serialization(_)))
        ));
        assert_eq!(
            publish_offline().unwrap_err().to_string(),
            "Bus not connected"
        );
    }
}
