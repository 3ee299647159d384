//! Command catalog
//!
//! The catalog is the in-memory, ordered list of commands offered to
//! clients through `GET_COMMANDS`. It is populated lazily from a
//! [`CatalogProvider`] and only ever mutated server-side; changes reach the
//! provider's persisted copy on an explicit [`Catalog::save`].
//!
//! Provider calls run on tokio's blocking pool, so providers may do
//! synchronous file I/O.

mod command;
mod file;
mod memory;

pub use command::Command;
pub use file::{default_commands, JsonFileProvider};
pub use memory::MemoryProvider;

use crate::error::{DeckError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of persisted catalog entries
pub trait CatalogProvider: Send + Sync {
    /// Load the ordered list of commands
    fn load(&self) -> Result<Vec<Command>>;

    /// Persist the ordered list of commands
    fn save(&self, commands: &[Command]) -> Result<()>;
}

/// In-memory command catalog
pub struct Catalog {
    provider: Arc<dyn CatalogProvider>,
    commands: RwLock<Vec<Command>>,
}

impl Catalog {
    /// Create an empty catalog backed by `provider`
    pub fn new(provider: Arc<dyn CatalogProvider>) -> Self {
        Self {
            provider,
            commands: RwLock::new(Vec::new()),
        }
    }

    /// Current commands, loading from the provider if the catalog is empty
    pub async fn get_available(&self) -> Result<Vec<Command>> {
        {
            let commands = self.commands.read().await;
            if !commands.is_empty() {
                return Ok(commands.clone());
            }
        }

        let mut commands = self.commands.write().await;
        if commands.is_empty() {
            *commands = self.load_from_provider().await?;
        }
        Ok(commands.clone())
    }

    /// Replace the in-memory catalog from the provider
    pub async fn reload(&self) -> Result<usize> {
        let loaded = self.load_from_provider().await?;
        let count = loaded.len();

        let mut commands = self.commands.write().await;
        *commands = loaded;

        info!("Catalog reloaded with {} commands", count);
        Ok(count)
    }

    /// Remove the command with the given identifier
    ///
    /// Returns the removed command, or `None` if no entry matched.
    pub async fn remove(&self, id: &Uuid) -> Option<Command> {
        let mut commands = self.commands.write().await;
        let index = commands.iter().position(|c| c.id.as_ref() == Some(id))?;
        let removed = commands.remove(index);

        debug!("Removed command '{}' ({})", removed.label, id);
        Some(removed)
    }

    /// Remove a command by its identifier; commands without one are never removed
    pub async fn remove_command(&self, command: &Command) -> Option<Command> {
        match command.id() {
            Some(id) => self.remove(&id).await,
            None => None,
        }
    }

    /// Append a command, assigning it a fresh identifier
    pub async fn add(&self, mut command: Command) -> Uuid {
        let id = command.assign_id();

        let mut commands = self.commands.write().await;
        debug!("Added command '{}' ({})", command.label, id);
        commands.push(command);
        id
    }

    /// Persist the in-memory catalog through the provider
    pub async fn save(&self) -> Result<()> {
        let snapshot = self.commands.read().await.clone();
        let count = snapshot.len();

        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.save(&snapshot))
            .await
            .map_err(|e| DeckError::Catalog(format!("Catalog save task failed: {}", e)))??;

        info!("Saved {} commands", count);
        Ok(())
    }

    /// Number of commands currently held in memory
    pub async fn len(&self) -> usize {
        self.commands.read().await.len()
    }

    /// Whether the in-memory catalog is empty
    pub async fn is_empty(&self) -> bool {
        self.commands.read().await.is_empty()
    }

    async fn load_from_provider(&self) -> Result<Vec<Command>> {
        let provider = self.provider.clone();
        let loaded = tokio::task::spawn_blocking(move || provider.load())
            .await
            .map_err(|e| DeckError::Catalog(format!("Catalog load task failed: {}", e)))??;
        let mut seen = HashSet::new();
        let mut commands = Vec::with_capacity(loaded.len());

        for mut command in loaded {
            if command.action.trim().is_empty() {
                warn!("Skipping catalog entry '{}' with an empty action", command.label);
                continue;
            }

            match command.id {
                Some(id) if seen.insert(id) => {}
                _ => {
                    let id = command.assign_id();
                    seen.insert(id);
                }
            }

            commands.push(command);
        }

        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn catalog_with(commands: Vec<Command>) -> (Arc<MemoryProvider>, Catalog) {
        let provider = Arc::new(MemoryProvider::new(commands));
        let catalog = Catalog::new(provider.clone());
        (provider, catalog)
    }

    #[tokio::test]
    async fn test_lazy_load_once() {
        let (provider, catalog) = catalog_with(default_commands());
        assert!(catalog.is_empty().await);

        let first = catalog.get_available().await.unwrap();
        assert_eq!(first.len(), 5);

        // A populated catalog is not reloaded behind our back
        provider.set(vec![Command::new("Other", "Transition")]);
        let second = catalog.get_available().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ids_assigned_and_unique() {
        let mut a = Command::new("A", "ToggleMute");
        let id = a.assign_id();
        let mut b = Command::new("B", "Transition");
        b.id = Some(id);
        let c = Command::new("C", "ToggleCamera");

        let (_, catalog) = catalog_with(vec![a, b, c]);
        let commands = catalog.get_available().await.unwrap();

        let ids: HashSet<Uuid> = commands.iter().filter_map(Command::id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(commands[0].id(), Some(id));
    }

    #[tokio::test]
    async fn test_empty_actions_skipped() {
        let (_, catalog) =
            catalog_with(vec![Command::new("Blank", "  "), Command::new("T", "Transition")]);

        let loaded = catalog.get_available().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].action, "Transition");
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, catalog) = catalog_with(default_commands());
        let commands = catalog.get_available().await.unwrap();
        let id = commands[1].id().unwrap();

        let removed = catalog.remove(&id).await.unwrap();
        assert_eq!(removed.label, "Transition");
        assert_eq!(catalog.get_available().await.unwrap().len(), 4);

        assert!(catalog.remove(&id).await.is_none());
        assert_eq!(catalog.get_available().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_remove_command_without_id_is_noop() {
        let (_, catalog) = catalog_with(default_commands());
        catalog.get_available().await.unwrap();

        let orphan = Command::new("Toggle Mute", "ToggleMute");
        assert!(catalog.remove_command(&orphan).await.is_none());
        assert_eq!(catalog.len().await, 5);
    }

    #[tokio::test]
    async fn test_remove_does_not_persist_until_save() {
        let (provider, catalog) = catalog_with(default_commands());
        let id = catalog.get_available().await.unwrap()[0].id().unwrap();

        catalog.remove(&id).await;
        assert_eq!(provider.stored().len(), 5);

        catalog.save().await.unwrap();
        let stored = provider.stored();
        assert_eq!(stored.len(), 4);
        assert!(stored.iter().all(|c| c.id() != Some(id)));
    }

    #[tokio::test]
    async fn test_reload_replaces_catalog() {
        let (_, catalog) = catalog_with(default_commands());
        catalog.get_available().await.unwrap();

        let id = catalog.add(Command::new("Extra", "Transition")).await;
        assert_eq!(catalog.len().await, 6);

        let count = catalog.reload().await.unwrap();
        assert_eq!(count, 5);
        let commands = catalog.get_available().await.unwrap();
        assert!(commands.iter().all(|c| c.id() != Some(id)));
    }

    #[tokio::test]
    async fn test_emptied_catalog_reloads_on_access() {
        let (_, catalog) = catalog_with(vec![Command::new("Only", "Transition")]);
        let id = catalog.get_available().await.unwrap()[0].id().unwrap();

        catalog.remove(&id).await;
        assert!(catalog.is_empty().await);

        let again = catalog.get_available().await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].label, "Only");
    }

    /// Loads only once the sender is released by another task
    struct GatedProvider {
        gate: std::sync::Mutex<mpsc::Receiver<()>>,
    }

    impl CatalogProvider for GatedProvider {
        fn load(&self) -> Result<Vec<Command>> {
            self.gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(2))
                .map_err(|_| DeckError::Catalog("gate never opened".to_string()))?;
            Ok(default_commands())
        }

        fn save(&self, _commands: &[Command]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_provider_load_leaves_runtime_free() {
        let (tx, rx) = mpsc::channel();
        let catalog = Catalog::new(Arc::new(GatedProvider {
            gate: std::sync::Mutex::new(rx),
        }));

        // Single-threaded runtime: this task only runs if load() is off the runtime thread
        tokio::spawn(async move {
            tx.send(()).unwrap();
        });

        assert_eq!(catalog.get_available().await.unwrap().len(), 5);
    }
}
