//! Error types for deck-agent
//!
//! This module defines the crate-wide error type. We use `thiserror` for
//! ergonomic error definitions and `anyhow` for error propagation in the
//! binary.

use thiserror::Error;

/// Main error type for deck-agent operations
#[derive(Error, Debug)]
pub enum DeckError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command catalog errors (load/save)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Backend session errors
    #[error("Backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),

    /// Control server errors (bind, listener setup)
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using DeckError
pub type Result<T> = std::result::Result<T, DeckError>;

impl From<serde_json::Error> for DeckError {
    fn from(err: serde_json::Error) -> Self {
        DeckError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DeckError {
    fn from(err: toml::de::Error) -> Self {
        DeckError::Config(err.to_string())
    }
}
