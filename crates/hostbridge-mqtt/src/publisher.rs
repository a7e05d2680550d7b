//! Raw publish capability used by command entities.

use async_trait::async_trait;

use hostbridge_commands::BusResult;

/// Publishes a payload to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> BusResult<()>;
}
