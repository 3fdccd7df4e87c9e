//! String setting handlers for paths and executable names.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config_with_message, success_set, success_unset};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::{Config, DEFAULT_SERVER_BINARY, DEFAULT_SERVER_HOST};

/// Data-driven handler for free-form string settings.
pub struct StringHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    get: fn(&Config) -> Option<String>,
    set_field: fn(&mut Config, Option<String>),
}

impl SettingHandler for StringHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = args.join(" ").trim().to_string();
        if value.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let message = success_set(self.key, &value);
        let set_field = self.set_field;
        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                set_field(config, Some(value));
                Ok(())
            },
            message,
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
            Some(value) => format!("  {}: {value}", self.key),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

/// Create a handler for the `default-model` setting.
pub fn default_model_handler() -> StringHandler {
    StringHandler {
        key: "default-model",
        hint: "To load a model at startup, specify its path:",
        example: "ggufchat set default-model ~/models/mistral-7b.Q4_K_M.gguf",
        default_display: "none",
        get: |c| c.default_model.clone(),
        set_field: |c, v| c.default_model = v,
    }
}

/// Create a handler for the `models-dir` setting.
pub fn models_dir_handler() -> StringHandler {
    StringHandler {
        key: "models-dir",
        hint: "To change where models are listed from, specify a directory:",
        example: "ggufchat set models-dir ~/models",
        default_display: "<data dir>/models",
        get: |c| c.models_dir.clone(),
        set_field: |c, v| c.models_dir = v,
    }
}

/// Create a handler for the `sessions-dir` setting.
pub fn sessions_dir_handler() -> StringHandler {
    StringHandler {
        key: "sessions-dir",
        hint: "To change where sessions are saved, specify a directory:",
        example: "ggufchat set sessions-dir ~/chats",
        default_display: "<data dir>/sessions",
        get: |c| c.sessions_dir.clone(),
        set_field: |c, v| c.sessions_dir = v,
    }
}

/// Create a handler for the `server-binary` setting.
pub fn server_binary_handler() -> StringHandler {
    StringHandler {
        key: "server-binary",
        hint: "To use a specific llama-server build, specify the executable:",
        example: "ggufchat set server-binary /opt/llama.cpp/build/bin/llama-server",
        default_display: DEFAULT_SERVER_BINARY,
        get: |c| Some(c.server.binary.clone()).filter(|b| b != DEFAULT_SERVER_BINARY),
        set_field: |c, v| {
            c.server.binary = v.unwrap_or_else(|| DEFAULT_SERVER_BINARY.to_string())
        },
    }
}

/// Create a handler for the `server-host` setting.
pub fn server_host_handler() -> StringHandler {
    StringHandler {
        key: "server-host",
        hint: "To bind the inference server elsewhere, specify a host:",
        example: "ggufchat set server-host 127.0.0.1",
        default_display: DEFAULT_SERVER_HOST,
        get: |c| Some(c.server.host.clone()).filter(|h| h != DEFAULT_SERVER_HOST),
        set_field: |c, v| c.server.host = v.unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
    }
}
