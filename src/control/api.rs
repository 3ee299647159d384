//! Control protocol request and response types
//!
//! The control protocol is plaintext and newline-delimited: one request per
//! line, one or more response lines per request.

use crate::backend::BackendError;
use crate::error::DeckError;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Lists the command catalog
pub const GET_COMMANDS: &str = "GET_COMMANDS";
/// Re-reads the command catalog from its provider
pub const RELOAD_COMMANDS: &str = "RELOAD_COMMANDS";
/// Removes a catalog entry by identifier
pub const REMOVE_COMMAND: &str = "REMOVE_COMMAND";
/// Persists the command catalog through its provider
pub const SAVE_COMMANDS: &str = "SAVE_COMMANDS";
/// Toggles an audio input's mute state
pub const TOGGLE_MUTE: &str = "ToggleMute";
/// Triggers the studio-mode transition
pub const TRANSITION: &str = "Transition";
/// Toggles the camera source
pub const TOGGLE_CAMERA: &str = "ToggleCamera";

/// Prefix selecting macro execution
pub const MACRO_PREFIX: &str = "MACRO:";
/// Leading token of a delay step
pub const DELAY_MARKER: &str = "DELAY";
/// Prefix of the `GET_COMMANDS` response
pub const COMMAND_LIST_PREFIX: &str = "COMMAND_LIST:";
/// Console input that stops the server
pub const QUIT_COMMAND: &str = ":quit";

/// Longest accepted request line in bytes, excluding the newline
pub const MAX_REQUEST_LEN: usize = 8 * 1024;

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Run a single action
    Action {
        /// Action token (first space-delimited field)
        action: String,
        /// Remainder of the line after the first space
        parameters: String,
    },
    /// Run the named macro
    Macro(String),
}

impl Request {
    /// Parse a request line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.trim_start().is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix(MACRO_PREFIX) {
            let name = rest.split_once(':').map_or(rest, |(name, _)| name);
            return Some(Self::Macro(name.to_string()));
        }

        let (action, parameters) = line.split_once(' ').unwrap_or((line, ""));
        Some(Self::Action {
            action: action.to_string(),
            parameters: parameters.to_string(),
        })
    }
}

/// Response line for an unknown action
pub fn not_found(action: &str) -> String {
    format!("Command not found ({})", action)
}

/// Acknowledgment written before a macro's steps run
pub fn macro_ack(name: &str) -> String {
    format!("Running Macro:{}", name)
}

/// Response line for a failed action
pub fn error_line(error: &CommandError) -> String {
    format!("Error: {}", error)
}

/// Write one response line and flush it
pub async fn write_line<W>(out: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Errors raised by action handlers
///
/// These never close the connection; they are reported to the client as an
/// `Error: <reason>` line.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    /// Backend capability call failed
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// Catalog load/save failed
    #[error("{0}")]
    Catalog(String),

    /// Parameters could not be interpreted
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Request line longer than [`MAX_REQUEST_LEN`]
    #[error("Request exceeds {0} bytes")]
    RequestTooLong(usize),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DeckError> for CommandError {
    fn from(err: DeckError) -> Self {
        match err {
            DeckError::Backend(e) => CommandError::Backend(e),
            DeckError::Catalog(msg) => CommandError::Catalog(msg),
            DeckError::Validation(msg) => CommandError::InvalidParameters(msg),
            _ => CommandError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(action: &str, parameters: &str) -> Request {
        Request::Action {
            action: action.to_string(),
            parameters: parameters.to_string(),
        }
    }

    #[test]
    fn test_parse_action_with_parameters() {
        assert_eq!(
            Request::parse("ToggleMute mic1\r\n"),
            Some(action("ToggleMute", "mic1"))
        );
        assert_eq!(
            Request::parse("ToggleMute Mic/Aux Left\n"),
            Some(action("ToggleMute", "Mic/Aux Left"))
        );
    }

    #[test]
    fn test_parse_action_without_parameters() {
        assert_eq!(Request::parse("Transition\n"), Some(action("Transition", "")));
        assert_eq!(Request::parse("GET_COMMANDS"), Some(action("GET_COMMANDS", "")));
    }

    #[test]
    fn test_parse_macro() {
        assert_eq!(
            Request::parse("MACRO:MyMacro\n"),
            Some(Request::Macro("MyMacro".to_string()))
        );
        assert_eq!(
            Request::parse("MACRO:Intro:ignored"),
            Some(Request::Macro("Intro".to_string()))
        );
        assert_eq!(Request::parse("MACRO:"), Some(Request::Macro(String::new())));
    }

    #[test]
    fn test_parse_blank_lines() {
        assert_eq!(Request::parse(""), None);
        assert_eq!(Request::parse("\r\n"), None);
        assert_eq!(Request::parse("   \n"), None);
    }

    #[test]
    fn test_response_lines() {
        assert_eq!(not_found("Green"), "Command not found (Green)");
        assert_eq!(macro_ack("MyMacro"), "Running Macro:MyMacro");
        let err = CommandError::Backend(BackendError::Timeout("ToggleInputMute".to_string()));
        assert_eq!(error_line(&err), "Error: ToggleInputMute timed out");
        assert_eq!(
            error_line(&CommandError::RequestTooLong(MAX_REQUEST_LEN)),
            "Error: Request exceeds 8192 bytes"
        );
    }

    #[test]
    fn test_deck_error_conversion() {
        let err: CommandError = DeckError::Catalog("disk full".to_string()).into();
        match err {
            CommandError::Catalog(msg) => assert_eq!(msg, "disk full"),
            _ => panic!("Wrong error type"),
        }
    }

    #[tokio::test]
    async fn test_write_line() {
        let mut out = Vec::new();
        write_line(&mut out, "Transition executed.").await.unwrap();
        assert_eq!(out, b"Transition executed.\n");
    }
}
