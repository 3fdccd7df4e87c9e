//! Helper functions for settings operations.

use crate::core::config::data::Config;
use crate::core::config::ConfigOrchestrator;

use super::error::SettingError;

/// Wrapper around `ConfigOrchestrator::mutate` that maps errors to
/// `SettingError::ConfigError`.
pub fn mutate_config<F>(orchestrator: &ConfigOrchestrator, f: F) -> Result<(), SettingError>
where
    F: FnOnce(&mut Config) -> Result<(), Box<dyn std::error::Error>>,
{
    orchestrator
        .mutate(f)
        .map_err(|e| SettingError::ConfigError(e.to_string()))
}

/// Apply `f` and return `message` on success.
pub fn mutate_config_with_message<F>(
    orchestrator: &ConfigOrchestrator,
    f: F,
    message: String,
) -> Result<String, SettingError>
where
    F: FnOnce(&mut Config) -> Result<(), Box<dyn std::error::Error>>,
{
    mutate_config(orchestrator, f).map(|()| message)
}

pub fn success_set(key: &str, value: &str) -> String {
    format!("✅ Set {key} to: {value}")
}

pub fn success_unset(key: &str) -> String {
    format!("✅ Unset {key}")
}

/// Parse a boolean value from user input.
///
/// Accepts: on/off, true/false, yes/no (case-insensitive).
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Format a boolean value for display.
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_words() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(format_bool(true), "on");
    }
}
