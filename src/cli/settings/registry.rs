//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{
    default_model_handler, max_sessions_handler, models_dir_handler, parameter_handlers,
    roleplay_handler, server_binary_handler, server_host_handler, server_port_handler,
    sessions_dir_handler, startup_timeout_handler, DefaultPersonaHandler,
};
use super::SettingHandler;

/// Registry of all available setting handlers.
pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `ggufchat config` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        registry.register(Box::new(default_model_handler()));
        registry.register(Box::new(DefaultPersonaHandler));
        registry.register(Box::new(roleplay_handler()));
        registry.register(Box::new(models_dir_handler()));
        registry.register(Box::new(sessions_dir_handler()));
        registry.register(Box::new(max_sessions_handler()));
        registry.register(Box::new(server_binary_handler()));
        registry.register(Box::new(server_host_handler()));
        registry.register(Box::new(server_port_handler()));
        registry.register(Box::new(startup_timeout_handler()));
        for handler in parameter_handlers() {
            registry.register(Box::new(handler));
        }

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    /// Get a handler by key. Underscores are accepted in place of dashes.
    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        let normalized = key.trim().to_ascii_lowercase().replace('_', "-");
        self.handlers.get(normalized.as_str()).map(|h| h.as_ref())
    }

    /// Get all keys in sorted order.
    pub fn keys_sorted(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.handlers.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Get all keys in display order.
    pub fn keys_display_order(&self) -> &[&'static str] {
        &self.display_order
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::settings::{SetContext, SettingError};
    use crate::core::config::data::Config;
    use crate::core::config::ConfigOrchestrator;
    use tempfile::TempDir;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn set(
        registry: &SettingRegistry,
        orchestrator: &ConfigOrchestrator,
        key: &str,
        values: &[&str],
    ) -> Result<String, SettingError> {
        let config = orchestrator.load().unwrap();
        let mut ctx = SetContext {
            config: &config,
            orchestrator,
        };
        registry.get(key).unwrap().set(&args(values), &mut ctx)
    }

    fn unset(registry: &SettingRegistry, orchestrator: &ConfigOrchestrator, key: &str) {
        let config = orchestrator.load().unwrap();
        let mut ctx = SetContext {
            config: &config,
            orchestrator,
        };
        registry.get(key).unwrap().unset(&mut ctx).unwrap();
    }

    #[test]
    fn every_key_is_registered_once() {
        let registry = SettingRegistry::new();
        let keys = registry.keys_sorted();
        assert_eq!(keys.len(), registry.keys_display_order().len());
        for key in ["default-model", "roleplay", "temperature", "n-gpu-layers", "server-port"] {
            assert!(registry.get(key).is_some(), "{key}");
        }
        assert!(registry.get("max_tokens").is_some());
        assert!(registry.get("theme").is_none());
    }

    #[test]
    fn set_and_unset_persist_to_disk() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ConfigOrchestrator::new(dir.path().join("config.toml"));
        let registry = SettingRegistry::new();

        set(&registry, &orchestrator, "default-model", &["~/models/a.gguf"]).unwrap();
        set(&registry, &orchestrator, "roleplay", &["on"]).unwrap();
        set(&registry, &orchestrator, "default-persona", &["Pirate"]).unwrap();
        set(&registry, &orchestrator, "temperature", &["1.1"]).unwrap();
        set(&registry, &orchestrator, "n-ctx", &["8192"]).unwrap();
        set(&registry, &orchestrator, "server-port", &["9000"]).unwrap();

        let reloaded = Config::load_from_path(orchestrator.path()).unwrap();
        assert_eq!(reloaded.default_model.as_deref(), Some("~/models/a.gguf"));
        assert_eq!(reloaded.roleplay, Some(true));
        assert_eq!(reloaded.default_persona.as_deref(), Some("pirate"));
        assert_eq!(reloaded.generation.sampling.temperature, 1.1);
        assert_eq!(reloaded.model_params.n_ctx, 8192);
        assert_eq!(reloaded.server.port, 9000);

        unset(&registry, &orchestrator, "temperature");
        unset(&registry, &orchestrator, "roleplay");
        unset(&registry, &orchestrator, "server-port");
        let reloaded = Config::load_from_path(orchestrator.path()).unwrap();
        assert_eq!(reloaded.generation.sampling.temperature, 0.7);
        assert_eq!(reloaded.roleplay, None);
        assert_eq!(reloaded.server.port, 8089);
    }

    #[test]
    fn invalid_values_are_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ConfigOrchestrator::new(dir.path().join("config.toml"));
        let registry = SettingRegistry::new();

        assert!(matches!(
            set(&registry, &orchestrator, "roleplay", &["maybe"]),
            Err(SettingError::InvalidBoolean(_))
        ));
        assert!(matches!(
            set(&registry, &orchestrator, "top-p", &["4"]),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            set(&registry, &orchestrator, "max-sessions", &["0"]),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            set(&registry, &orchestrator, "default-persona", &["wizard"]),
            Err(SettingError::UnknownPersona { .. })
        ));
        assert!(matches!(
            set(&registry, &orchestrator, "default-model", &[]),
            Err(SettingError::MissingArgs { .. })
        ));
        assert!(!orchestrator.path().exists());
    }

    #[test]
    fn format_shows_defaults() {
        let registry = SettingRegistry::new();
        let config = Config::default();
        assert_eq!(
            registry.get("roleplay").unwrap().format(&config),
            "  roleplay: (unset, default: off)"
        );
        assert_eq!(
            registry.get("n-threads").unwrap().format(&config),
            "  n-threads: auto"
        );
        assert_eq!(
            registry.get("server-port").unwrap().format(&config),
            "  server-port: (unset, default: 8089)"
        );
    }
}
