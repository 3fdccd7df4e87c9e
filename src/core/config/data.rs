use crate::core::generation::{GenerationSettings, ModelParams};
use crate::core::preset::StylePreset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_SESSIONS: usize = 50;
pub const DEFAULT_SERVER_BINARY: &str = "llama-server";
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8089;
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 120;

/// How the inference engine is launched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Executable started with the model file (a llama.cpp `llama-server` build)
    pub binary: String,
    pub host: String,
    pub port: u16,
    /// How long to wait for the engine to report healthy after launch
    pub startup_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_SERVER_BINARY.to_string(),
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model file loaded at startup when no `-m` flag is given
    pub default_model: Option<String>,
    /// Directory scanned for `.gguf` files
    pub models_dir: Option<String>,
    /// Directory holding saved sessions
    pub sessions_dir: Option<String>,
    /// Persona id selected for new conversations
    pub default_persona: Option<String>,
    /// Start new conversations with roleplay enabled
    pub roleplay: Option<bool>,
    /// Oldest sessions are pruned beyond this count
    pub max_sessions: Option<usize>,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub model_params: ModelParams,
    #[serde(default)]
    pub server: ServerConfig,
    /// User-defined style presets
    #[serde(default)]
    pub presets: Vec<StylePreset>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn max_sessions(&self) -> usize {
        self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS).max(1)
    }

    pub fn roleplay_enabled(&self) -> bool {
        self.roleplay.unwrap_or(false)
    }
}
