//! JSON file catalog provider
//!
//! Commands are stored as a JSON array. A missing file is created and
//! seeded with the built-in default commands.

use crate::catalog::{CatalogProvider, Command};
use crate::error::{DeckError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Catalog provider backed by a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    /// Create a provider for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with the default commands
    fn seed_defaults(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    DeckError::Catalog(format!(
                        "Failed to create catalog directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        self.save(&default_commands())?;
        info!("Seeded default commands at {:?}", self.path);
        Ok(())
    }
}

impl CatalogProvider for JsonFileProvider {
    fn load(&self) -> Result<Vec<Command>> {
        if !self.path.exists() {
            warn!("Commands file {:?} not found, creating it", self.path);
            self.seed_defaults()?;
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            DeckError::Catalog(format!("Failed to read {:?}: {}", self.path, e))
        })?;

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let commands: Option<Vec<Command>> = serde_json::from_str(&contents).map_err(|e| {
            DeckError::Catalog(format!("Failed to parse {:?}: {}", self.path, e))
        })?;
        let commands = commands.unwrap_or_default();

        debug!("Loaded {} commands from {:?}", commands.len(), self.path);
        Ok(commands)
    }

    fn save(&self, commands: &[Command]) -> Result<()> {
        debug!("Saving {} commands to {:?}", commands.len(), self.path);

        let json = serde_json::to_string_pretty(commands)?;
        fs::write(&self.path, json).map_err(|e| {
            DeckError::Catalog(format!("Failed to write {:?}: {}", self.path, e))
        })
    }
}

/// Commands written to a freshly created catalog file
pub fn default_commands() -> Vec<Command> {
    vec![
        Command::new("Toggle Mute", "ToggleMute").with_icon("mute_icon.png"),
        Command::new("Transition", "Transition").with_icon("transition_icon.png"),
        Command::new("Green", "Green").with_icon("green.png"),
        Command::new("Toggle Camera", "ToggleCamera").with_icon("toggle_camera.png"),
        Command::new("Macro 1", "MACRO:MyMacro").with_icon("macro1.png"),
    ]
}
