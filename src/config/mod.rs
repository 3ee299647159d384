//! Configuration management
//!
//! This module handles parsing and validation of the agent's TOML
//! configuration file: control server, OBS backend, command catalog and the
//! macro table.

mod validation;

pub use validation::{
    validate_delay_step, validate_host, validate_macro_name, validate_port,
};

use crate::control::MacroStep;
use crate::error::{DeckError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// Default TCP port for the control server
pub const DEFAULT_SERVICE_PORT: u16 = 5445;

/// Default obs-websocket port
pub const DEFAULT_OBS_PORT: u16 = 4455;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Control server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// OBS backend settings
    #[serde(default)]
    pub obs: ObsConfig,

    /// Command catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Named macros (name -> ordered steps)
    #[serde(default = "default_macros")]
    pub macros: HashMap<String, Vec<MacroStepConfig>>,
}

/// Control server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the control socket to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind the control socket to
    #[serde(default = "default_service_port")]
    pub port: u16,

    /// Exit the process once the server stops
    #[serde(default)]
    pub headless: bool,
}

/// OBS websocket connection configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    /// obs-websocket host
    #[serde(default = "default_obs_host")]
    pub host: String,

    /// obs-websocket port
    #[serde(default = "default_obs_port")]
    pub port: u16,

    /// obs-websocket password, if authentication is enabled
    #[serde(default, skip_serializing)]
    pub password: Option<Zeroizing<String>>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Scene holding the camera source
    #[serde(default = "default_camera_scene")]
    pub camera_scene: String,

    /// Camera source toggled by `ToggleCamera`
    #[serde(default = "default_camera_source")]
    pub camera_source: String,

    /// Input muted by `ToggleMute` when no input name is given
    #[serde(default)]
    pub default_mute_input: Option<String>,
}

/// Command catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the commands JSON file
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

/// A macro step as written in the configuration file
///
/// Either a full command line (`"ToggleMute mic1"`, `"DELAY 5000"`) or a
/// table with separate action and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MacroStepConfig {
    /// Whole command line
    Line(String),
    /// Action token plus parameters
    Command {
        /// Action token
        command: String,
        /// Parameters passed to the action
        #[serde(default)]
        parameters: String,
    },
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            DeckError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Load configuration from a TOML file, or use defaults if it is absent
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| DeckError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        validate_host(&self.server.bind_address)
            .map_err(|e| DeckError::Config(format!("[server] {}", e)))?;
        validate_port(self.server.port)
            .map_err(|e| DeckError::Config(format!("[server] {}", e)))?;

        validate_host(&self.obs.host).map_err(|e| DeckError::Config(format!("[obs] {}", e)))?;
        validate_port(self.obs.port).map_err(|e| DeckError::Config(format!("[obs] {}", e)))?;
        if self.obs.request_timeout_ms == 0 {
            return Err(DeckError::Config(
                "[obs] request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        for (name, steps) in &self.macros {
            validate_macro_name(name)
                .map_err(|e| DeckError::Config(format!("Macro '{}': {}", name, e)))?;
            for step in steps {
                step.validate()
                    .map_err(|e| DeckError::Config(format!("Macro '{}': {}", name, e)))?;
            }
        }

        Ok(())
    }

    /// Socket address string the control server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

impl MacroStepConfig {
    /// The step's command token (the whole line for [`MacroStepConfig::Line`])
    pub fn token(&self) -> &str {
        match self {
            Self::Line(line) => line.trim(),
            Self::Command { command, .. } => command.trim(),
        }
    }

    /// Action token and parameters of this step
    pub fn split(&self) -> (&str, &str) {
        match self {
            Self::Line(line) => {
                let line = line.trim();
                line.split_once(' ').unwrap_or((line, ""))
            }
            Self::Command {
                command,
                parameters,
            } => (command.trim(), parameters.as_str()),
        }
    }

    /// Validate a single step
    pub fn validate(&self) -> Result<()> {
        MacroStep::try_from(self).map(|_| ())
    }
}

impl ObsConfig {
    /// Websocket URL for the configured host and port
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ObsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObsConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("camera_scene", &self.camera_scene)
            .field("camera_source", &self.camera_source)
            .field("default_mute_input", &self.default_mute_input)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            obs: ObsConfig::default(),
            catalog: CatalogConfig::default(),
            macros: default_macros(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_service_port(),
            headless: false,
        }
    }
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            request_timeout_ms: default_request_timeout_ms(),
            camera_scene: default_camera_scene(),
            camera_source: default_camera_source(),
            default_mute_input: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

// Default value functions for serde
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    DEFAULT_OBS_PORT
}

fn default_request_timeout_ms() -> u64 {
    1000
}

fn default_camera_scene() -> String {
    "_Generic_1_AudioAlertsCamera__".to_string()
}

fn default_camera_source() -> String {
    "_CameraScene".to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("config").join("commands.json")
}

fn default_macros() -> HashMap<String, Vec<MacroStepConfig>> {
    let steps = ["ToggleMute", "ToggleCamera", "DELAY 5000", "ToggleMute", "ToggleCamera"]
        .iter()
        .map(|s| MacroStepConfig::Line(s.to_string()))
        .collect();

    let mut macros = HashMap::new();
    macros.insert("MyMacro".to_string(), steps);
    macros
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5445);
        assert_eq!(config.obs.port, 4455);
        assert!(!config.server.headless);
        assert_eq!(config.macros["MyMacro"].len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            bind_address = "127.0.0.1"
            port = 6000
            headless = true

            [obs]
            host = "studio.local"
            port = 4444
            password = "secret"
            request_timeout_ms = 2500
            default_mute_input = "Mic/Aux"

            [catalog]
            path = "/tmp/commands.json"

            [macros]
            Intro = ["Transition", "DELAY 250", { command = "ToggleMute", parameters = "Desktop Audio" }]
        "#;

        let config = Config::parse(toml).expect("Failed to parse TOML");
        assert_eq!(config.bind_addr(), "127.0.0.1:6000");
        assert!(config.server.headless);
        assert_eq!(config.obs.url(), "ws://studio.local:4444");
        assert_eq!(config.obs.password.as_deref().map(String::as_str), Some("secret"));
        assert_eq!(config.obs.request_timeout_ms, 2500);
        assert_eq!(config.catalog.path, PathBuf::from("/tmp/commands.json"));

        // An explicit [macros] table replaces the built-in one
        assert!(!config.macros.contains_key("MyMacro"));
        let intro = &config.macros["Intro"];
        assert_eq!(intro.len(), 3);
        assert_eq!(intro[2].split(), ("ToggleMute", "Desktop Audio"));
    }

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::parse("").expect("Failed to parse empty TOML");
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.obs.camera_source, "_CameraScene");
        assert!(config.obs.password.is_none());
        assert!(config.macros.contains_key("MyMacro"));
    }

    #[test]
    fn test_invalid_delay_rejected() {
        let toml = r#"
            [macros]
            Broken = ["DELAY soon"]
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_invalid_macro_name_rejected() {
        let toml = r#"
            [macros]
            "Bad:Name" = ["Transition"]
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let toml = r#"
            [server]
            port = 0
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let mut config = ObsConfig::default();
        config.password = Some(Zeroizing::new("hunter2".to_string()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_step_split() {
        let step = MacroStepConfig::Line("ToggleMute Mic/Aux Left".to_string());
        assert_eq!(step.split(), ("ToggleMute", "Mic/Aux Left"));

        let step = MacroStepConfig::Line("Transition".to_string());
        assert_eq!(step.split(), ("Transition", ""));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::from_file_or_default("/nonexistent/deck-agent.toml").unwrap();
        assert_eq!(config.server.port, DEFAULT_SERVICE_PORT);
    }
}
