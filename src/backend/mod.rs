//! Studio backend session
//!
//! The backend is the long-lived connection to the studio-control software.
//! The server only relies on the [`StudioBackend`] capability calls; the
//! default implementation talks obs-websocket v5 ([`ObsBackend`]).

mod obs;
mod protocol;

pub use obs::ObsBackend;
pub use protocol::{auth_response, RPC_VERSION};

use async_trait::async_trait;
use thiserror::Error;

/// Backend capability calls used by the command handlers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudioBackend: Send + Sync {
    /// Toggle the mute state of an audio input
    async fn toggle_mute(&self, input: &str) -> Result<(), BackendError>;

    /// Trigger the studio-mode transition (preview to program)
    async fn trigger_transition(&self) -> Result<(), BackendError>;

    /// Toggle the visibility of the camera source
    async fn toggle_camera(&self) -> Result<(), BackendError>;
}

/// Backend session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Could not establish or keep the connection
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The backend rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The backend answered a request with a failure status
    #[error("{request} failed (code {code}): {comment}")]
    Request {
        /// Request type
        request: String,
        /// Backend status code
        code: u16,
        /// Backend comment
        comment: String,
    },

    /// No answer within the request timeout
    #[error("{0} timed out")]
    Timeout(String),

    /// Unexpected or malformed message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Missing or invalid argument for a capability call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session is closed
    #[error("Backend session closed")]
    Closed,
}
