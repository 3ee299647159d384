//! Action handlers
//!
//! Each action token the server understands is bound to an
//! [`ActionHandler`]. Backend handlers forward to the [`StudioBackend`];
//! catalog handlers read or mutate the in-memory [`Catalog`].

use crate::backend::StudioBackend;
use crate::catalog::Catalog;
use crate::control::{CommandError, COMMAND_LIST_PREFIX};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Executes one action and renders its response line
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with the request's parameters
    async fn execute(&self, parameters: &str) -> Result<String, CommandError>;
}

/// `ToggleMute <input>`
pub struct ToggleMuteHandler {
    backend: Arc<dyn StudioBackend>,
}

impl ToggleMuteHandler {
    /// Create a handler bound to `backend`
    pub fn new(backend: Arc<dyn StudioBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ActionHandler for ToggleMuteHandler {
    async fn execute(&self, parameters: &str) -> Result<String, CommandError> {
        self.backend.toggle_mute(parameters).await?;
        Ok("Toggle Mute executed.".to_string())
    }
}

/// `Transition`
pub struct TransitionHandler {
    backend: Arc<dyn StudioBackend>,
}

impl TransitionHandler {
    /// Create a handler bound to `backend`
    pub fn new(backend: Arc<dyn StudioBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ActionHandler for TransitionHandler {
    async fn execute(&self, _parameters: &str) -> Result<String, CommandError> {
        self.backend.trigger_transition().await?;
        Ok("Transition executed.".to_string())
    }
}

/// `ToggleCamera`
pub struct ToggleCameraHandler {
    backend: Arc<dyn StudioBackend>,
}

impl ToggleCameraHandler {
    /// Create a handler bound to `backend`
    pub fn new(backend: Arc<dyn StudioBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ActionHandler for ToggleCameraHandler {
    async fn execute(&self, _parameters: &str) -> Result<String, CommandError> {
        self.backend.toggle_camera().await?;
        Ok("Toggle Camera executed.".to_string())
    }
}

/// `GET_COMMANDS`: the catalog as a JSON array
pub struct ListCommandsHandler {
    catalog: Arc<Catalog>,
}

impl ListCommandsHandler {
    /// Create a handler reading `catalog`
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ActionHandler for ListCommandsHandler {
    async fn execute(&self, _parameters: &str) -> Result<String, CommandError> {
        let commands = self.catalog.get_available().await?;
        let json = serde_json::to_string(&commands)
            .map_err(|e| CommandError::Internal(format!("Failed to serialize catalog: {}", e)))?;

        debug!("Listing {} commands", commands.len());
        Ok(format!("{}{}", COMMAND_LIST_PREFIX, json))
    }
}

/// `RELOAD_COMMANDS`
pub struct ReloadCommandsHandler {
    catalog: Arc<Catalog>,
}

impl ReloadCommandsHandler {
    /// Create a handler reloading `catalog`
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ActionHandler for ReloadCommandsHandler {
    async fn execute(&self, _parameters: &str) -> Result<String, CommandError> {
        let count = self.catalog.reload().await?;
        Ok(format!("Commands reloaded ({}).", count))
    }
}

/// `REMOVE_COMMAND <uuid>`
pub struct RemoveCommandHandler {
    catalog: Arc<Catalog>,
}

impl RemoveCommandHandler {
    /// Create a handler removing from `catalog`
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ActionHandler for RemoveCommandHandler {
    async fn execute(&self, parameters: &str) -> Result<String, CommandError> {
        let id = Uuid::parse_str(parameters.trim()).map_err(|e| {
            CommandError::InvalidParameters(format!("'{}' is not a command id: {}", parameters, e))
        })?;

        match self.catalog.remove(&id).await {
            Some(removed) => {
                info!("Removed command '{}' ({})", removed.label, id);
                Ok(format!("Command {} removed.", id))
            }
            None => Ok(format!("Command {} not in catalog.", id)),
        }
    }
}

/// `SAVE_COMMANDS`
pub struct SaveCommandsHandler {
    catalog: Arc<Catalog>,
}

impl SaveCommandsHandler {
    /// Create a handler saving `catalog`
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ActionHandler for SaveCommandsHandler {
    async fn execute(&self, _parameters: &str) -> Result<String, CommandError> {
        self.catalog.save().await?;
        Ok("Commands saved.".to_string())
    }
}
