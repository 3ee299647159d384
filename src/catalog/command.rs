//! Catalog command entries

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A catalog entry: one invocable action with a display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Human-readable label
    #[serde(default)]
    pub label: String,

    /// Action token dispatched by the server
    #[serde(rename = "command")]
    pub action: String,

    /// Icon file name for front-ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Free-form parameters passed to the action
    #[serde(default)]
    pub parameters: String,

    /// Identifier assigned when the command joins the live catalog
    #[serde(rename = "uuid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl Command {
    /// Create a new command without an identifier
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
            icon: None,
            parameters: String::new(),
            id: None,
        }
    }

    /// Set the icon
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the parameters
    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Identifier, if one has been assigned
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Assign a fresh identifier and return it
    pub fn assign_id(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.id = Some(id);
        id
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.trim().is_empty() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{}({})", self.label, self.parameters)
        }
    }
}
