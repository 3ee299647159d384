//! Macro table
//!
//! Macros are named, ordered step lists built once from configuration.
//! Delay steps are parsed here so that running a macro never re-parses
//! step text.

use crate::config::{validate_delay_step, MacroStepConfig};
use crate::control::DELAY_MARKER;
use crate::error::{DeckError, Result};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// One macro step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroStep {
    /// Dispatch an action with parameters
    Invoke {
        /// Action token
        action: String,
        /// Parameters passed to the action
        parameters: String,
    },
    /// Pause the connection for the given duration
    Delay(Duration),
}

impl MacroStep {
    /// Invoke step
    pub fn invoke(action: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self::Invoke {
            action: action.into(),
            parameters: parameters.into(),
        }
    }

    /// Delay step of `millis` milliseconds
    pub fn delay_ms(millis: u64) -> Self {
        Self::Delay(Duration::from_millis(millis))
    }

    /// Parse a step from its command line form (`"ToggleMute mic1"`, `"DELAY 500"`)
    pub fn parse(line: &str) -> Result<Self> {
        Self::try_from(&MacroStepConfig::Line(line.to_string()))
    }
}

impl TryFrom<&MacroStepConfig> for MacroStep {
    type Error = DeckError;

    fn try_from(config: &MacroStepConfig) -> Result<Self> {
        let token = config.token();
        if token.starts_with(DELAY_MARKER) {
            return validate_delay_step(token).map(Self::Delay);
        }

        let (action, parameters) = config.split();
        if action.is_empty() {
            return Err(DeckError::Validation(
                "Macro step action cannot be empty".to_string(),
            ));
        }

        Ok(Self::invoke(action, parameters))
    }
}

impl fmt::Display for MacroStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay(d) => write!(f, "{} {}", DELAY_MARKER, d.as_millis()),
            Self::Invoke { action, parameters } if parameters.is_empty() => f.write_str(action),
            Self::Invoke { action, parameters } => write!(f, "{} {}", action, parameters),
        }
    }
}

/// Read-only mapping from macro name to steps
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Vec<MacroStep>>,
}

impl MacroTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configured macros
    pub fn from_config(config: &HashMap<String, Vec<MacroStepConfig>>) -> Result<Self> {
        let mut table = Self::new();

        for (name, steps) in config {
            let steps = steps
                .iter()
                .map(MacroStep::try_from)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| DeckError::Config(format!("Macro '{}': {}", name, e)))?;
            table.insert(name.clone(), steps);
        }

        Ok(table)
    }

    /// Add or replace a macro
    pub fn insert(&mut self, name: impl Into<String>, steps: Vec<MacroStep>) {
        self.macros.insert(name.into(), steps);
    }

    /// Steps of the named macro; unknown names have no steps
    pub fn steps(&self, name: &str) -> &[MacroStep] {
        self.macros.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a macro with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Macro names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of macros
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether the table has no macros
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Sum of all delays in the named macro
    pub fn total_delay(&self, name: &str) -> Duration {
        self.steps(name)
            .iter()
            .filter_map(|step| match step {
                MacroStep::Delay(d) => Some(*d),
                MacroStep::Invoke { .. } => None,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_parse_steps() {
        assert_eq!(
            MacroStep::parse("ToggleMute mic1").unwrap(),
            MacroStep::invoke("ToggleMute", "mic1")
        );
        assert_eq!(
            MacroStep::parse("Transition").unwrap(),
            MacroStep::invoke("Transition", "")
        );
        assert_eq!(MacroStep::parse("DELAY 5000").unwrap(), MacroStep::delay_ms(5000));
        assert!(MacroStep::parse("DELAY").is_err());
        assert!(MacroStep::parse("").is_err());
    }

    #[test]
    fn test_table_step_config_delay_uses_token() {
        let step = MacroStepConfig::Command {
            command: "DELAY 250".to_string(),
            parameters: "ignored".to_string(),
        };
        assert_eq!(MacroStep::try_from(&step).unwrap(), MacroStep::delay_ms(250));

        // The duration comes from the token, never from the parameters
        let step = MacroStepConfig::Command {
            command: "DELAY".to_string(),
            parameters: "250".to_string(),
        };
        assert!(MacroStep::try_from(&step).is_err());
    }

    #[test]
    fn test_default_table() {
        let table = MacroTable::from_config(&Config::default().macros).unwrap();
        assert_eq!(table.names(), vec!["MyMacro"]);
        assert_eq!(
            table.steps("MyMacro"),
            &[
                MacroStep::invoke("ToggleMute", ""),
                MacroStep::invoke("ToggleCamera", ""),
                MacroStep::delay_ms(5000),
                MacroStep::invoke("ToggleMute", ""),
                MacroStep::invoke("ToggleCamera", ""),
            ]
        );
        assert_eq!(table.total_delay("MyMacro"), Duration::from_millis(5000));
    }

    #[test]
    fn test_unknown_macro_has_no_steps() {
        let table = MacroTable::new();
        assert!(table.is_empty());
        assert!(!table.contains("Nope"));
        assert!(table.steps("Nope").is_empty());
        assert_eq!(table.total_delay("Nope"), Duration::ZERO);
    }

    #[test]
    fn test_display_matches_line_form() {
        for line in ["ToggleMute mic1", "Transition", "DELAY 5000"] {
            assert_eq!(MacroStep::parse(line).unwrap().to_string(), line);
        }
    }
}
