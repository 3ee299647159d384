//! In-memory catalog provider

use crate::catalog::{CatalogProvider, Command};
use crate::error::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Catalog provider keeping its persisted copy in memory
///
/// Useful for embedding the server without a commands file, and in tests.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stored: Mutex<Vec<Command>>,
}

impl MemoryProvider {
    /// Create a provider holding `commands`
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            stored: Mutex::new(commands),
        }
    }

    /// Snapshot of the persisted copy
    pub fn stored(&self) -> Vec<Command> {
        self.lock().clone()
    }

    /// Replace the persisted copy
    pub fn set(&self, commands: Vec<Command>) {
        *self.lock() = commands;
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Command>> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogProvider for MemoryProvider {
    fn load(&self) -> Result<Vec<Command>> {
        Ok(self.stored())
    }

    fn save(&self, commands: &[Command]) -> Result<()> {
        self.set(commands.to_vec());
        Ok(())
    }
}
