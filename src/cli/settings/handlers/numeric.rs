//! Numeric setting handlers.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config_with_message, success_set, success_unset};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::{
    Config, DEFAULT_MAX_SESSIONS, DEFAULT_SERVER_PORT, DEFAULT_STARTUP_TIMEOUT_SECS,
};

/// Data-driven handler for bounded integer settings.
pub struct NumericHandler {
    key: &'static str,
    example: &'static str,
    min: u64,
    max: u64,
    default: u64,
    get: fn(&Config) -> Option<u64>,
    set_field: fn(&mut Config, Option<u64>),
}

impl NumericHandler {
    fn parse(&self, input: &str) -> Result<u64, SettingError> {
        let value: u64 = input.trim().parse().map_err(|_| SettingError::InvalidValue {
            key: self.key,
            message: format!("'{input}' is not a whole number"),
        })?;
        if value < self.min || value > self.max {
            return Err(SettingError::InvalidValue {
                key: self.key,
                message: format!("{value} is outside {}..={}", self.min, self.max),
            });
        }
        Ok(value)
    }
}

impl SettingHandler for NumericHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let [input] = args else {
            return Err(SettingError::MissingArgs {
                hint: "Specify a single number:",
                example: self.example,
            });
        };
        let value = self.parse(input)?;
        let set_field = self.set_field;
        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                set_field(config, Some(value));
                Ok(())
            },
            success_set(self.key, &value.to_string()),
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                set_field(config, None);
                Ok(())
            },
            success_unset(self.key),
        )
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) if value != self.default => format!("  {}: {value}", self.key),
            _ => format!("  {}: (unset, default: {})", self.key, self.default),
        }
    }
}

/// Create a handler for the `max-sessions` setting.
pub fn max_sessions_handler() -> NumericHandler {
    NumericHandler {
        key: "max-sessions",
        example: "ggufchat set max-sessions 100",
        min: 1,
        max: 100_000,
        default: DEFAULT_MAX_SESSIONS as u64,
        get: |c| c.max_sessions.map(|n| n as u64),
        set_field: |c, v| c.max_sessions = v.map(|n| n as usize),
    }
}

/// Create a handler for the `server-port` setting.
pub fn server_port_handler() -> NumericHandler {
    NumericHandler {
        key: "server-port",
        example: "ggufchat set server-port 8089",
        min: 1,
        max: u16::MAX as u64,
        default: DEFAULT_SERVER_PORT as u64,
        get: |c| Some(c.server.port as u64),
        set_field: |c, v| c.server.port = v.map(|p| p as u16).unwrap_or(DEFAULT_SERVER_PORT),
    }
}

/// Create a handler for the `startup-timeout` setting.
pub fn startup_timeout_handler() -> NumericHandler {
    NumericHandler {
        key: "startup-timeout",
        example: "ggufchat set startup-timeout 300",
        min: 1,
        max: 3600,
        default: DEFAULT_STARTUP_TIMEOUT_SECS,
        get: |c| Some(c.server.startup_timeout_secs),
        set_field: |c, v| {
            c.server.startup_timeout_secs = v.unwrap_or(DEFAULT_STARTUP_TIMEOUT_SECS)
        },
    }
}
