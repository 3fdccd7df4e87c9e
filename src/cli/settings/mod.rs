//! Settings management for CLI set/unset commands.
//!
//! Each configuration key has a handler implementing [`SettingHandler`]:
//!
//! - Boolean settings (`roleplay`)
//! - Simple string settings (`default-model`, `models-dir`, `sessions-dir`,
//!   `server-binary`, `default-persona`)
//! - Numeric settings (`max-sessions`, `server-port`, `startup-timeout`)
//! - Parameter settings for every generation and load parameter

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use crate::core::config::data::Config;
use crate::core::config::ConfigOrchestrator;

/// Context provided to setting handlers during set/unset operations.
pub struct SetContext<'a> {
    /// Snapshot used for validation
    pub config: &'a Config,
    pub orchestrator: &'a ConfigOrchestrator,
}

/// Trait for handling a configuration setting.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Set the value from the words following the key. Returns the message
    /// to display.
    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Reset the value to its default.
    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Format the current value for display in `ggufchat config` output.
    fn format(&self, config: &Config) -> String;
}
