//! deck-agent: remote control server for OBS Studio
//!
//! This library provides a small line-oriented TCP server that lets a
//! remote "deck" (a phone or tablet app, a hardware button panel) drive an
//! OBS Studio instance: toggle mute, trigger the studio-mode transition,
//! toggle the camera source, list the configured command catalog, and run
//! named macros with delays.
//!
//! # Modules
//!
//! - `config`: Configuration parsing and validation
//! - `backend`: Studio backend session (obs-websocket v5)
//! - `catalog`: Command catalog and its persistence
//! - `control`: Line protocol, dispatcher, macros and the TCP server
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod control;
pub mod error;

// Re-export commonly used types
pub use error::{DeckError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
