//! Configuration validation functions
//!
//! This module provides validation for ports, host names, macro names and
//! delay steps.

use crate::control::DELAY_MARKER;
use crate::error::{DeckError, Result};
use std::time::Duration;

/// Validate a TCP port (must be non-zero)
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(DeckError::Validation(
            "Port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(())
}

/// Validate a host name or address
pub fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(DeckError::Validation("Host cannot be empty".to_string()));
    }

    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(DeckError::Validation(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    Ok(())
}

/// Validate a macro name
///
/// Names are matched against the text after `MACRO:` up to the next `:`,
/// so they cannot contain `:` themselves.
pub fn validate_macro_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DeckError::Validation(
            "Macro name cannot be empty".to_string(),
        ));
    }

    if name.contains(':') {
        return Err(DeckError::Validation(format!(
            "Macro name '{}' cannot contain ':'",
            name
        )));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(DeckError::Validation(format!(
            "Macro name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// Validate a delay step (`DELAY <milliseconds>`) and return its duration
pub fn validate_delay_step(step: &str) -> Result<Duration> {
    let mut fields = step.split_whitespace();

    match fields.next() {
        Some(marker) if marker == DELAY_MARKER => {}
        _ => {
            return Err(DeckError::Validation(format!(
                "Delay step '{}' must start with '{}'",
                step, DELAY_MARKER
            )))
        }
    }

    let millis = fields
        .next()
        .ok_or_else(|| {
            DeckError::Validation(format!("Delay step '{}' is missing a duration", step))
        })?
        .parse::<u64>()
        .map_err(|_| {
            DeckError::Validation(format!(
                "Delay step '{}' has an invalid duration (expected milliseconds)",
                step
            ))
        })?;

    if fields.next().is_some() {
        return Err(DeckError::Validation(format!(
            "Delay step '{}' has trailing fields",
            step
        )));
    }

    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port() {
        assert!(validate_port(5445).is_ok());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(0).is_err());
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("192.168.1.10").is_ok());
        assert!(validate_host("").is_err());
        assert!(validate_host("bad host").is_err());
        assert!(validate_host("ws://host").is_err());
    }

    #[test]
    fn test_validate_macro_name() {
        assert!(validate_macro_name("MyMacro").is_ok());
        assert!(validate_macro_name("intro_2").is_ok());
        assert!(validate_macro_name("").is_err());
        assert!(validate_macro_name("a:b").is_err());
        assert!(validate_macro_name("my macro").is_err());
    }

    #[test]
    fn test_validate_delay_step() {
        assert_eq!(
            validate_delay_step("DELAY 5000").unwrap(),
            Duration::from_millis(5000)
        );
        assert_eq!(validate_delay_step("DELAY   0").unwrap(), Duration::ZERO);
        assert!(validate_delay_step("DELAY").is_err());
        assert!(validate_delay_step("DELAY -5").is_err());
        assert!(validate_delay_step("DELAY 5s").is_err());
        assert!(validate_delay_step("DELAY 5 10").is_err());
        assert!(validate_delay_step("WAIT 5").is_err());
    }
}
