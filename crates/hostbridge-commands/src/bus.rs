//! Bus gateway interface.
//!
//! Abstraction over the message bus client: liveness announcements,
//! per-command subscriptions and a connection status query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::CommandEntity;
use crate::error::BusResult;

/// Bus connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusStatus {
    /// Not connected
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and operational
    Connected,
    /// Reconnecting after disconnect
    Reconnecting,
    /// Error state
    Error,
}

impl BusStatus {
    /// Whether the bus is still in its initial connection attempt.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

impl std::fmt::Display for BusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Message bus gateway.
#[async_trait]
pub trait BusGateway: Send + Sync {
    /// Current connection status.
    fn status(&self) -> BusStatus;

    /// Announce that this host is available.
    async fn announce_availability(&self) -> BusResult<()>;

    /// Subscribe to invocations of a command.
    async fn subscribe(&self, command: &dyn CommandEntity) -> BusResult<()>;

    /// Drop the subscription for a command.
    async fn unsubscribe(&self, command: &dyn CommandEntity) -> BusResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(BusStatus::Connected.to_string(), "connected");
        assert_eq!(BusStatus::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn test_only_connecting_is_transitional() {
        assert!(BusStatus::Connecting.is_transitional());
        assert!(!BusStatus::Reconnecting.is_transitional());
        assert!(!BusStatus::Disconnected.is_transitional());
    }
}
