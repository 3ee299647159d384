//! Console shutdown listener
//!
//! Reads the process console on a dedicated OS thread; `:quit` stops the
//! control server. The thread is never joined on shutdown.

use crate::control::{ServerState, QUIT_COMMAND};
use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Spawn a thread watching `input` for the quit command
pub fn spawn_console_listener<R>(input: R, state: Arc<ServerState>) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || watch_console(input, &state))
}

/// Read lines from `input` until the quit command, EOF, or a read error
pub fn watch_console<R: BufRead>(input: R, state: &ServerState) {
    for line in input.lines() {
        match line {
            Ok(line) if line.trim() == QUIT_COMMAND => {
                info!("Received {} on console", QUIT_COMMAND);
                state.request_shutdown();
                return;
            }
            Ok(line) => debug!("Ignoring console input: {}", line),
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        }
    }

    debug!("Console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_quit_requests_shutdown() {
        let state = ServerState::new();
        watch_console(Cursor::new("status\n:quit\nignored\n"), &state);
        assert!(!state.is_running());
    }

    #[test]
    fn test_eof_keeps_running() {
        let state = ServerState::new();
        watch_console(Cursor::new("hello\nquit\n"), &state);
        assert!(state.is_running());
    }

    #[test]
    fn test_spawned_listener() {
        let state = Arc::new(ServerState::new());
        let handle = spawn_console_listener(Cursor::new("  :quit  \n"), state.clone()).unwrap();
        handle.join().unwrap();
        assert!(!state.is_running());
    }
}
