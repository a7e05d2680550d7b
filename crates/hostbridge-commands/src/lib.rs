//! Command reconciliation and publishing engine.
//!
//! Provides:
//! - Command configuration types and the command kind help table
//! - The command registry, cycle state and pause gate
//! - The reconciler that applies desired command lists
//! - The periodic publish cycle (availability, autodiscovery, subscriptions, state)
//! - Command list persistence
//!
//! The message bus, the concrete commands and the spec/entity conversion are
//! collaborators supplied through the `BusGateway`, `CommandEntity` and
//! `CommandFactory` traits.

pub mod bus;
pub mod command;
pub mod config;
pub mod convert;
pub mod cycle;
pub mod entity;
pub mod error;
pub mod manager;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod types;

// Re-exports
pub use command::{CommandId, CommandSpec, CommandType, EntityType, generate_id};

pub use bus::{BusGateway, BusStatus};

pub use entity::CommandEntity;

pub use convert::CommandFactory;

pub use config::EngineConfig;

pub use cycle::{CycleOutcome, PublishCycle};

pub use error::{BusError, BusResult, CommandError, StoreError};

pub use manager::CommandManager;

pub use reconciler::Reconciler;

pub use registry::{CommandRegistry, CycleState, PauseGuard, PublishLedger};

pub use store::{CommandStore, JsonFileStore, MemoryStore};

pub use types::{UNKNOWN_TYPE_DESCRIPTION, describe_command_type};
