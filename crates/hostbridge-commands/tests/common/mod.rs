//! Recording collaborators shared by the engine tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use hostbridge_commands::{
    BusError, BusGateway, BusResult, BusStatus, CommandEntity, CommandFactory, CommandId,
    CommandManager, CommandSpec, CommandStore, CommandType, EngineConfig, MemoryStore, StoreError,
    generate_id,
};

/// Name that makes the entity fail when publishing autodiscovery.
pub const FAILING_NAME: &str = "explode";

/// One observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Announce,
    Subscribe { id: String, name: String },
    Unsubscribe { id: String, name: String },
    PublishDiscovery { id: String, name: String },
    UnpublishDiscovery { id: String, name: String },
    PublishState { id: String, force: bool },
    ClearCache { id: String },
}

impl Call {
    /// Whether the call reached the bus (cache clears are local).
    pub fn is_bus_call(&self) -> bool {
        !matches!(self, Call::ClearCache { .. })
    }
}

/// Action run once a matching call has been seen often enough.
struct Trigger {
    matches: Box<dyn Fn(&Call) -> bool + Send>,
    remaining: usize,
    action: Box<dyn FnOnce() + Send>,
}

/// Shared, ordered call log.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
    trigger: Arc<Mutex<Option<Trigger>>>,
}

impl CallLog {
    pub fn push(&self, call: Call) {
        let fire = match self.trigger.lock().unwrap().as_mut() {
            Some(trigger) if (trigger.matches)(&call) => {
                trigger.remaining = trigger.remaining.saturating_sub(1);
                trigger.remaining == 0
            }
            _ => false,
        };
        self.calls.lock().unwrap().push(call);

        if fire {
            let trigger = self.trigger.lock().unwrap().take();
            if let Some(trigger) = trigger {
                (trigger.action)();
            }
        }
    }

    /// Run `action` right after the `count`-th call matching `matches`.
    pub fn after(
        &self,
        count: usize,
        matches: impl Fn(&Call) -> bool + Send + 'static,
        action: impl FnOnce() + Send + 'static,
    ) {
        *self.trigger.lock().unwrap() = Some(Trigger {
            matches: Box::new(matches),
            remaining: count,
            action: Box::new(action),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bus_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_bus_call).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

/// Gateway that records calls and reports a settable status.
pub struct MockGateway {
    log: CallLog,
    status: Arc<Mutex<BusStatus>>,
}

impl MockGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            status: Arc::new(Mutex::new(BusStatus::Connected)),
        }
    }

    pub fn set_status(&self, status: BusStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Drop the connection right after the `count`-th call matching `matches`.
    pub fn disconnect_after(
        &self,
        count: usize,
        matches: impl Fn(&Call) -> bool + Send + 'static,
    ) {
        let status = Arc::clone(&self.status);
        self.log.after(count, matches, move || {
            *status.lock().unwrap() = BusStatus::Disconnected;
        });
    }
}

#[async_trait]
impl BusGateway for MockGateway {
    fn status(&self) -> BusStatus {
        *self.status.lock().unwrap()
    }

    async fn announce_availability(&self) -> BusResult<()> {
        if self.status() != BusStatus::Connected {
            return Err(BusError::NotConnected);
        }
        self.log.push(Call::Announce);
        Ok(())
    }

    async fn subscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        self.log.push(Call::Subscribe {
            id: command.id(),
            name: command.name(),
        });
        Ok(())
    }

    async fn unsubscribe(&self, command: &dyn CommandEntity) -> BusResult<()> {
        self.log.push(Call::Unsubscribe {
            id: command.id(),
            name: command.name(),
        });
        Ok(())
    }
}

/// Entity that records calls.
pub struct MockCommand {
    spec: RwLock<CommandSpec>,
    log: CallLog,
}

impl MockCommand {
    pub fn spec(&self) -> CommandSpec {
        self.spec.read().unwrap().clone()
    }
}

#[async_trait]
impl CommandEntity for MockCommand {
    fn id(&self) -> CommandId {
        self.spec.read().unwrap().id.clone().unwrap_or_default()
    }

    fn set_id(&self, id: CommandId) {
        self.spec.write().unwrap().id = Some(id);
    }

    fn name(&self) -> String {
        self.spec.read().unwrap().name.clone()
    }

    fn command_type(&self) -> CommandType {
        self.spec.read().unwrap().command_type
    }

    fn command_topic(&self) -> String {
        let spec = self.spec.read().unwrap();
        format!("test/{}/{}/set", spec.entity_type.component(), spec.name)
    }

    async fn publish_autodiscovery(&self) -> BusResult<()> {
        if self.name() == FAILING_NAME {
            return Err(BusError::Publish("refused".to_string()));
        }
        self.log.push(Call::PublishDiscovery {
            id: self.id(),
            name: self.name(),
        });
        Ok(())
    }

    async fn unpublish_autodiscovery(&self) -> BusResult<()> {
        self.log.push(Call::UnpublishDiscovery {
            id: self.id(),
            name: self.name(),
        });
        Ok(())
    }

    fn clear_autodiscovery_cache(&self) {
        self.log.push(Call::ClearCache { id: self.id() });
    }

    async fn publish_state(&self, force: bool) -> BusResult<()> {
        self.log.push(Call::PublishState {
            id: self.id(),
            force,
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory producing `MockCommand`s.
pub struct MockFactory {
    log: CallLog,
}

impl MockFactory {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl CommandFactory for MockFactory {
    fn to_entity(&self, spec: &CommandSpec) -> Option<Arc<dyn CommandEntity>> {
        spec.validate().ok()?;

        let mut spec = spec.clone();
        if spec.id().is_none() {
            spec.id = Some(generate_id());
        }

        Some(Arc::new(MockCommand {
            spec: RwLock::new(spec),
            log: self.log.clone(),
        }))
    }

    fn to_spec(&self, entity: &dyn CommandEntity) -> Option<CommandSpec> {
        entity
            .as_any()
            .downcast_ref::<MockCommand>()
            .map(MockCommand::spec)
    }
}

/// Store that always fails to persist.
pub struct FailingStore;

#[async_trait]
impl CommandStore for FailingStore {
    async fn load(&self) -> Result<Vec<CommandSpec>, StoreError> {
        Ok(Vec::new())
    }

    async fn persist(&self, _commands: &[CommandSpec]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

/// Manager wired to recording collaborators.
pub struct Harness {
    pub log: CallLog,
    pub gateway: Arc<MockGateway>,
    pub store: Arc<MemoryStore>,
    pub manager: CommandManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let log = CallLog::default();
        let gateway = Arc::new(MockGateway::new(log.clone()));
        let store = Arc::new(store);
        let manager = CommandManager::new(
            test_config(),
            gateway.clone(),
            Arc::new(MockFactory::new(log.clone())),
            store.clone(),
        );

        Self {
            log,
            gateway,
            store,
            manager,
        }
    }

    pub fn with_failing_store() -> (CallLog, CommandManager) {
        let log = CallLog::default();
        let manager = CommandManager::new(
            test_config(),
            Arc::new(MockGateway::new(log.clone())),
            Arc::new(MockFactory::new(log.clone())),
            Arc::new(FailingStore),
        );
        (log, manager)
    }
}

/// Engine timings used by the tests.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        first_delay_ms: 10,
        cycle_interval_secs: 30,
        announce_interval_secs: 30,
        connect_poll_ms: 5,
    }
}

/// Helper to create a spec with an identifier.
pub fn spec(id: &str, name: &str, command_type: CommandType) -> CommandSpec {
    CommandSpec::new(name, command_type).with_id(id)
}
