//! Control server
//!
//! This module provides the line-oriented TCP control surface: request
//! parsing, the command dispatcher and its action handlers, macro
//! expansion, and the connection/shutdown lifecycle.

mod api;
mod console;
mod dispatcher;
mod handler;
mod macros;
mod server;
mod state;

pub use api::{
    error_line, macro_ack, not_found, write_line, CommandError, Request, COMMAND_LIST_PREFIX,
    DELAY_MARKER, GET_COMMANDS, MACRO_PREFIX, MAX_REQUEST_LEN, QUIT_COMMAND, RELOAD_COMMANDS,
    REMOVE_COMMAND, SAVE_COMMANDS, TOGGLE_CAMERA, TOGGLE_MUTE, TRANSITION,
};
pub use console::{spawn_console_listener, watch_console};
pub use dispatcher::CommandDispatcher;
pub use handler::{
    ActionHandler, ListCommandsHandler, ReloadCommandsHandler, RemoveCommandHandler,
    SaveCommandsHandler, ToggleCameraHandler, ToggleMuteHandler, TransitionHandler,
};
pub use macros::{MacroStep, MacroTable};
pub use server::ControlServer;
pub use state::ServerState;
