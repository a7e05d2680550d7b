//! Command registry and shared cycle state.
//!
//! The registry is the ordered set of live commands. `CycleState` holds the
//! flags shared between the reconciler and the publish cycle, including the
//! pause gate.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::command::CommandId;
use crate::entity::CommandEntity;

/// Ordered collection of active commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<Vec<Arc<dyn CommandEntity>>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.commands.read().await.is_empty()
    }

    /// Number of registered commands.
    pub async fn len(&self) -> usize {
        self.commands.read().await.len()
    }

    /// Clone the current command list.
    ///
    /// Bus I/O runs against the snapshot so the lock is never held across an await.
    pub async fn snapshot(&self) -> Vec<Arc<dyn CommandEntity>> {
        self.commands.read().await.clone()
    }

    /// Identifiers in registry order.
    pub async fn ids(&self) -> Vec<CommandId> {
        self.commands.read().await.iter().map(|c| c.id()).collect()
    }

    /// Position of the command with the given identifier.
    pub async fn position(&self, id: &str) -> Option<usize> {
        self.commands.read().await.iter().position(|c| c.id() == id)
    }

    /// Get the command with the given identifier.
    pub async fn get(&self, id: &str) -> Option<Arc<dyn CommandEntity>> {
        self.commands
            .read()
            .await
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Identifier of the command listening on `topic`.
    pub async fn topic_owner(&self, topic: &str) -> Option<CommandId> {
        self.commands
            .read()
            .await
            .iter()
            .find(|c| c.command_topic() == topic)
            .map(|c| c.id())
    }

    /// Append a command.
    pub async fn push(&self, command: Arc<dyn CommandEntity>) {
        self.commands.write().await.push(command);
    }

    /// Replace the command at `index`, returning the previous one.
    pub async fn replace_at(
        &self,
        index: usize,
        command: Arc<dyn CommandEntity>,
    ) -> Option<Arc<dyn CommandEntity>> {
        let mut commands = self.commands.write().await;
        let slot = commands.get_mut(index)?;
        Some(std::mem::replace(slot, command))
    }

    /// Remove every command with the given identifier.
    pub async fn remove_by_id(&self, id: &str) -> usize {
        let mut commands = self.commands.write().await;
        let before = commands.len();
        commands.retain(|c| c.id() != id);
        before - commands.len()
    }

    /// Replace the whole command list.
    pub async fn replace_all(&self, new_commands: Vec<Arc<dyn CommandEntity>>) {
        *self.commands.write().await = new_commands;
    }
}

/// Identifiers currently known to be published and subscribed on the bus.
#[derive(Debug, Default)]
pub struct PublishLedger {
    discovery: HashSet<CommandId>,
    subscriptions: HashSet<CommandId>,
}

impl PublishLedger {
    /// Whether autodiscovery for `id` is published.
    pub fn is_published(&self, id: &str) -> bool {
        self.discovery.contains(id)
    }

    /// Whether the command topic for `id` is subscribed.
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.subscriptions.contains(id)
    }

    pub fn mark_published(&mut self, id: &str) {
        self.discovery.insert(id.to_string());
    }

    pub fn mark_unpublished(&mut self, id: &str) {
        self.discovery.remove(id);
    }

    pub fn mark_subscribed(&mut self, id: &str) {
        self.subscriptions.insert(id.to_string());
    }

    pub fn mark_unsubscribed(&mut self, id: &str) {
        self.subscriptions.remove(id);
    }

    /// Carry the bookkeeping of `old` over to `new`.
    pub fn rekey(&mut self, old: &str, new: &str) {
        if self.discovery.remove(old) {
            self.discovery.insert(new.to_string());
        }
        if self.subscriptions.remove(old) {
            self.subscriptions.insert(new.to_string());
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.discovery.clear();
        self.subscriptions.clear();
    }
}

/// Process-wide cycle flags.
pub struct CycleState {
    active: AtomicBool,
    paused: AtomicBool,
    subscribed: AtomicBool,
    last_announce: Mutex<Option<Instant>>,
    ledger: Mutex<PublishLedger>,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            active: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            last_announce: Mutex::new(None),
            ledger: Mutex::new(PublishLedger::default()),
        }
    }
}

impl CycleState {
    /// Create the startup state: active, unpaused, unsubscribed, never announced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the engine should keep running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Permanently deactivate the engine.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether the cycle is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Set the pause gate. Idempotent.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Pause the cycle until the returned guard is dropped.
    pub fn pause_scoped(self: &Arc<Self>) -> PauseGuard {
        self.set_paused(true);
        PauseGuard {
            state: Arc::clone(self),
        }
    }

    /// Whether subscriptions for the current autodiscovery round are established.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    pub fn set_subscribed(&self, subscribed: bool) {
        self.subscribed.store(subscribed, Ordering::SeqCst);
    }

    /// Last availability/autodiscovery round (None = never).
    pub async fn last_announce(&self) -> Option<Instant> {
        *self.last_announce.lock().await
    }

    pub async fn set_last_announce(&self, at: Option<Instant>) {
        *self.last_announce.lock().await = at;
    }

    /// Whether more than `interval` elapsed since the last announce round.
    pub async fn announce_due(&self, now: Instant, interval: std::time::Duration) -> bool {
        match *self.last_announce.lock().await {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        }
    }

    /// Access the publish ledger.
    pub async fn ledger(&self) -> tokio::sync::MutexGuard<'_, PublishLedger> {
        self.ledger.lock().await
    }
}

/// Releases the pause gate when dropped.
#[must_use = "the cycle resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    state: Arc<CycleState>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.state.set_paused(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_state_initial() {
        let state = CycleState::new();
        assert!(state.is_active());
        assert!(!state.is_paused());
        assert!(!state.is_subscribed());
    }

    #[test]
    fn test_pause_guard_releases_on_drop() {
        let state = Arc::new(CycleState::new());
        {
            let _guard = state.pause_scoped();
            assert!(state.is_paused());
        }
        assert!(!state.is_paused());
    }

    #[test]
    fn test_pause_guard_releases_on_panic() {
        let state = Arc::new(CycleState::new());
        let cloned = Arc::clone(&state);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.pause_scoped();
            panic!("mutation failed");
        }));

        assert!(result.is_err());
        assert!(!state.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_announce_due() {
        let state = CycleState::new();
        let interval = std::time::Duration::from_secs(30);

        assert!(state.announce_due(Instant::now(), interval).await);

        state.set_last_announce(Some(Instant::now())).await;
        assert!(!state.announce_due(Instant::now(), interval).await);

        tokio::time::advance(std::time::Duration::from_secs(31)).await;
        assert!(state.announce_due(Instant::now(), interval).await);
    }

    #[test]
    fn test_ledger() {
        let mut ledger = PublishLedger::default();
        ledger.mark_published("1");
        ledger.mark_subscribed("1");
        assert!(ledger.is_published("1"));
        assert!(ledger.is_subscribed("1"));

        ledger.rekey("1", "2");
        assert!(!ledger.is_published("1"));
        assert!(ledger.is_published("2"));
        assert!(ledger.is_subscribed("2"));

        ledger.mark_unsubscribed("2");
        assert!(!ledger.is_subscribed("2"));

        ledger.clear();
        assert!(!ledger.is_published("2"));
    }
}
