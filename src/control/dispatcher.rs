//! Command dispatcher
//!
//! Resolves action tokens through a registered-handler map and expands
//! macros into repeated dispatches, writing response lines as they are
//! produced.

use crate::backend::StudioBackend;
use crate::catalog::Catalog;
use crate::control::handler::{
    ActionHandler, ListCommandsHandler, ReloadCommandsHandler, RemoveCommandHandler,
    SaveCommandsHandler, ToggleCameraHandler, ToggleMuteHandler, TransitionHandler,
};
use crate::control::{
    error_line, macro_ack, not_found, write_line, MacroStep, MacroTable, Request, GET_COMMANDS,
    RELOAD_COMMANDS, REMOVE_COMMAND, SAVE_COMMANDS, TOGGLE_CAMERA, TOGGLE_MUTE, TRANSITION,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, warn};

/// Routes requests to action handlers and macro expansion
pub struct CommandDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
    macros: MacroTable,
}

impl CommandDispatcher {
    /// Create a dispatcher with no handlers
    pub fn new(macros: MacroTable) -> Self {
        Self {
            handlers: HashMap::new(),
            macros,
        }
    }

    /// Create a dispatcher with the built-in backend and catalog actions
    pub fn with_defaults(
        backend: Arc<dyn StudioBackend>,
        catalog: Arc<Catalog>,
        macros: MacroTable,
    ) -> Self {
        let mut dispatcher = Self::new(macros);

        dispatcher.register(GET_COMMANDS, Arc::new(ListCommandsHandler::new(catalog.clone())));
        dispatcher.register(
            RELOAD_COMMANDS,
            Arc::new(ReloadCommandsHandler::new(catalog.clone())),
        );
        dispatcher.register(
            REMOVE_COMMAND,
            Arc::new(RemoveCommandHandler::new(catalog.clone())),
        );
        dispatcher.register(SAVE_COMMANDS, Arc::new(SaveCommandsHandler::new(catalog)));

        dispatcher.register(TOGGLE_MUTE, Arc::new(ToggleMuteHandler::new(backend.clone())));
        dispatcher.register(TRANSITION, Arc::new(TransitionHandler::new(backend.clone())));
        dispatcher.register(TOGGLE_CAMERA, Arc::new(ToggleCameraHandler::new(backend)));

        dispatcher
    }

    /// Bind `action` to `handler`, replacing any previous binding
    pub fn register(&mut self, action: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let action = action.into();
        debug!("Registering action '{}'", action);
        self.handlers.insert(action, handler);
    }

    /// Whether `action` has a handler
    pub fn is_registered(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action tokens, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// The macro table
    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Run one action and render its response line
    ///
    /// Unknown actions and handler failures are reported in the returned
    /// line; this never fails.
    pub async fn dispatch(&self, action: &str, parameters: &str) -> String {
        let Some(handler) = self.handlers.get(action) else {
            warn!("Command not found: {}", action);
            return not_found(action);
        };

        match handler.execute(parameters).await {
            Ok(line) => {
                info!("Executed {}", action);
                line
            }
            Err(e) => {
                error!("{} failed: {}", action, e);
                error_line(&e)
            }
        }
    }

    /// Run the named macro, writing the acknowledgment and each step's response
    ///
    /// Unknown macros run no steps. A failing step is reported and the
    /// remaining steps still run.
    pub async fn run_macro<W>(&self, name: &str, out: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        if !self.macros.contains(name) {
            warn!("Macro '{}' is not defined", name);
        }

        let steps = self.macros.steps(name);
        info!("Running macro '{}' ({} steps)", name, steps.len());
        write_line(&mut *out, &macro_ack(name)).await?;

        for step in steps {
            match step {
                MacroStep::Delay(duration) => {
                    debug!("Macro '{}' sleeping {:?}", name, duration);
                    tokio::time::sleep(*duration).await;
                }
                MacroStep::Invoke { action, parameters } => {
                    let line = self.dispatch(action, parameters).await;
                    write_line(&mut *out, &line).await?;
                }
            }
        }

        Ok(())
    }

    /// Execute a parsed request, writing all of its response lines
    pub async fn execute<W>(&self, request: &Request, out: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        match request {
            Request::Macro(name) => self.run_macro(name, out).await,
            Request::Action { action, parameters } => {
                let line = self.dispatch(action, parameters).await;
                write_line(&mut *out, &line).await
            }
        }
    }
}
