//! MQTT collaborators for the command engine.
//!
//! - `MqttGateway`: rumqttc client implementing `BusGateway`
//! - `HassCommand`: commands exposed through Home Assistant MQTT discovery
//! - `HassCommandFactory`: spec/entity conversion

pub mod config;
pub mod discovery;
pub mod entity;
pub mod factory;
pub mod gateway;
pub mod publisher;

pub use config::{MqttConfig, Qos};
pub use discovery::{CommandTopics, DeviceInfo, DiscoveryContext, DiscoveryPayload, sanitize};
pub use entity::{HassCommand, STATE_REFRESH_INTERVAL};
pub use factory::HassCommandFactory;
pub use gateway::{CommandInvocation, MqttGateway};
pub use publisher::Publisher;
