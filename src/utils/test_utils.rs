#[cfg(test)]
use crate::core::generation::GenerationSettings;
#[cfg(test)]
use crate::core::message::Message;
#[cfg(test)]
use crate::core::persona::Persona;
#[cfg(test)]
use crate::core::runner::{ModelRunner, RunnerError};
#[cfg(test)]
use crate::core::session::Session;
#[cfg(test)]
use crate::core::app::{App, AppInitConfig};
#[cfg(test)]
use crate::core::config::{Config, ConfigOrchestrator};
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::ffi::{OsStr, OsString};
#[cfg(test)]
use std::sync::{LazyLock, Mutex, MutexGuard};

#[cfg(test)]
static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Serializes environment mutation across tests and restores every touched
/// variable on drop.
#[cfg(test)]
pub struct TestEnvVarGuard {
    saved: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

#[cfg(test)]
impl TestEnvVarGuard {
    pub fn new() -> Self {
        let lock = ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: Vec::new(),
            _lock: lock,
        }
    }

    fn remember(&mut self, key: &OsStr) {
        if !self.saved.iter().any(|(saved, _)| saved == key) {
            self.saved.push((key.to_os_string(), std::env::var_os(key)));
        }
    }

    pub fn set_var(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) {
        self.remember(key.as_ref());
        std::env::set_var(key, value);
    }

    pub fn remove_var(&mut self, key: impl AsRef<OsStr>) {
        self.remember(key.as_ref());
        std::env::remove_var(key);
    }
}

#[cfg(test)]
impl Drop for TestEnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Runner double that replays canned results and records every prompt.
#[cfg(test)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<Result<String, RunnerError>>>,
    prompts: Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub fn new(responses: Vec<Result<String, RunnerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Err(RunnerError::Engine(message.to_string()))])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl ModelRunner for ScriptedRunner {
    async fn generate(
        &self,
        prompt: &str,
        _settings: &GenerationSettings,
    ) -> Result<String, RunnerError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RunnerError::Engine("script exhausted".to_string())))
    }
}

#[cfg(test)]
pub fn create_test_session(name: &str) -> Session {
    let mut session = Session::new(name);
    session.model_reference = "/models/test-model.Q4_K_M.gguf".to_string();
    session.messages.push(Message::user("Hello"));
    session
        .messages
        .push(Message::assistant("Hi there! How can I help?"));
    session.active_persona = Some(Persona::Pirate);
    session.roleplay_enabled = true;
    session
}

/// App wired to directories inside `dir`, with no model loaded.
#[cfg(test)]
pub fn create_test_app(dir: &tempfile::TempDir) -> App {
    let config = Config {
        sessions_dir: Some(dir.path().join("sessions").to_string_lossy().into_owned()),
        models_dir: Some(dir.path().join("models").to_string_lossy().into_owned()),
        ..Config::default()
    };
    let config_store = ConfigOrchestrator::new(dir.path().join("config.toml"));
    App::new(
        AppInitConfig::default(),
        config,
        config_store,
        reqwest::Client::new(),
    )
    .expect("test app")
}
