//! Command list persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::command::CommandSpec;
use crate::error::StoreError;

/// Durable storage for the configured command list.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Load the stored commands.
    async fn load(&self) -> Result<Vec<CommandSpec>, StoreError>;

    /// Replace the stored commands.
    async fn persist(&self, commands: &[CommandSpec]) -> Result<(), StoreError>;
}

/// Stores commands as a pretty-printed JSON array.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommandStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<CommandSpec>, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No stored commands at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&data)?)
    }

    async fn persist(&self, commands: &[CommandSpec]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(commands)?;

        // Write next to the target and rename so readers never see a partial file
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            "Stored {} command(s) to {}",
            commands.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    commands: RwLock<Vec<CommandSpec>>,
    persist_count: RwLock<usize>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with commands.
    pub fn with_commands(commands: Vec<CommandSpec>) -> Self {
        Self {
            commands: RwLock::new(commands),
            persist_count: RwLock::new(0),
        }
    }

    /// Currently stored commands.
    pub async fn commands(&self) -> Vec<CommandSpec> {
        self.commands.read().await.clone()
    }

    /// Number of times `persist` was called.
    pub async fn persist_count(&self) -> usize {
        *self.persist_count.read().await
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn load(&self) -> Result<Vec<CommandSpec>, StoreError> {
        Ok(self.commands.read().await.clone())
    }

    async fn persist(&self, commands: &[CommandSpec]) -> Result<(), StoreError> {
        *self.commands.write().await = commands.to_vec();
        *self.persist_count.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandType;

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("commands.json"));

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("commands.json"));

        let commands = vec![
            CommandSpec::new("Shutdown", CommandType::Shutdown).with_id("a"),
            CommandSpec::new("Browser", CommandType::LaunchUrl)
                .with_id("b")
                .with_command("https://example.org"),
        ];
        store.persist(&commands).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, commands);
        assert!(!dir.path().join("nested").join("commands.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_counts_persists() {
        let store = MemoryStore::new();
        store
            .persist(&[CommandSpec::new("Lock", CommandType::Lock)])
            .await
            .unwrap();

        assert_eq!(store.persist_count().await, 1);
        assert_eq!(store.commands().await.len(), 1);
    }
}
