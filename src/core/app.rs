//! Interactive chat state.
//!
//! [`App`] is the one long-lived owner of the active conversation, the
//! inference engine and the stores behind slash commands. The REPL holds it
//! and hands it to every operation.

use crate::core::chat::{ChatError, Conversation};
use crate::core::config::{Config, ConfigOrchestrator};
use crate::core::generation::{ModelParams, ParamError};
use crate::core::message::Message;
use crate::core::model_manager::{ModelLoadError, ModelManager};
use crate::core::persona::{Persona, PersonaCatalog};
use crate::core::preset::{PresetManager, StylePreset};
use crate::core::session::Session;
use crate::core::session_store::{RecordId, SessionStore, SessionStoreError, SessionSummary};
use crate::utils::logging::LoggingState;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Startup options collected from the command line.
#[derive(Debug, Default, Clone)]
pub struct AppInitConfig {
    pub model: Option<PathBuf>,
    pub log_file: Option<String>,
    pub persona: Option<String>,
    pub roleplay: bool,
    pub session: Option<String>,
}

pub struct App {
    pub conversation: Conversation,
    pub models: ModelManager,
    pub store: SessionStore,
    pub presets: PresetManager,
    pub catalog: PersonaCatalog,
    pub logging: LoggingState,
    config: Config,
    config_store: ConfigOrchestrator,
    startup_model: Option<PathBuf>,
    notices: Vec<String>,
}

impl App {
    pub fn new(
        init: AppInitConfig,
        config: Config,
        config_store: ConfigOrchestrator,
        client: Client,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let catalog = PersonaCatalog::builtin()?;
        let store = SessionStore::new(config.resolved_sessions_dir(), config.max_sessions());
        let mut presets = PresetManager::new(config.presets.clone());

        let mut session = match &init.session {
            Some(name) => store.load(name)?,
            None => new_session(&config, &catalog),
        };
        if let Some(id) = &init.persona {
            let persona = catalog.resolve(id).ok_or_else(|| {
                format!(
                    "Unknown persona '{id}'. Available: {}",
                    catalog.available_ids()
                )
            })?;
            session.active_persona = Some(persona);
        }
        if init.roleplay {
            session.roleplay_enabled = true;
        }
        presets.import(&session.user_presets);

        let startup_model = init
            .model
            .clone()
            .or_else(|| config.default_model.as_deref().map(PathBuf::from));

        Ok(Self {
            conversation: Conversation::new(session),
            models: ModelManager::new(config.server.clone(), client),
            store,
            presets,
            catalog,
            logging: LoggingState::new(init.log_file)?,
            config,
            config_store,
            startup_model,
            notices: Vec::new(),
        })
    }

    pub fn session(&self) -> &Session {
        self.conversation.session()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Model requested on the command line or configured as the default.
    pub fn take_startup_model(&mut self) -> Option<PathBuf> {
        self.startup_model.take()
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn log(&self, message: &Message) {
        if let Err(err) = self.logging.log_entry(message) {
            warn!(error = %err, "failed to write transcript log");
        }
    }

    /// Resolve a `/load-model` argument. Bare names are looked up in the
    /// models directory when they do not exist as given.
    pub fn resolve_model_path(&self, input: &str) -> PathBuf {
        let direct = PathBuf::from(input);
        if direct.exists() {
            return direct;
        }
        let in_models_dir = self.config.resolved_models_dir().join(input);
        if in_models_dir.exists() {
            in_models_dir
        } else {
            direct
        }
    }

    pub async fn load_model(&mut self, path: &Path) -> Result<String, ModelLoadError> {
        let params = self.session().model_params.clone();
        let info = self.models.load(path, &params).await?;
        let summary = format!(
            "Model loaded: {} in {:.2}s ({})",
            info.file_name(),
            info.load_time.as_secs_f64(),
            params
        );
        let reference = info.path.to_string_lossy().into_owned();
        self.conversation.session_mut().model_reference = reference;
        match self.conversation.push_note(summary.clone()) {
            Ok(()) => {
                if let Some(note) = self.conversation.session().messages.last() {
                    self.log(note);
                }
            }
            Err(err) => warn!(error = %err, "could not record load note"),
        }
        Ok(summary)
    }

    pub async fn eject(&mut self) -> Option<String> {
        let name = self.models.info().map(|info| info.file_name())?;
        self.models.unload().await;
        let message = format!("Model ejected: {name}");
        if let Err(err) = self.conversation.push_note(message.clone()) {
            warn!(error = %err, "could not record eject note");
        }
        Some(message)
    }

    /// Send one user turn to the loaded model.
    pub async fn submit(&mut self, user_text: &str) -> Result<Message, ChatError> {
        let runner = self.models.runner();
        let result = self.conversation.submit(user_text, runner).await;

        let messages = &self.conversation.session().messages;
        match &result {
            Ok(_) if messages.len() >= 2 => {
                self.log(&messages[messages.len() - 2]);
                self.log(&messages[messages.len() - 1]);
            }
            Err(ChatError::GenerationFailed(_)) => {
                if let Some(user) = messages.last() {
                    self.log(user);
                }
            }
            _ => {}
        }
        result
    }

    pub fn set_persona(&mut self, persona: Option<Persona>) -> String {
        let session = self.conversation.session_mut();
        session.active_persona = persona;
        match persona {
            Some(persona) if session.roleplay_enabled => {
                format!("Persona set: {}", persona.display_name())
            }
            Some(persona) => format!(
                "Persona set: {} (roleplay is off; use /roleplay on to apply it)",
                persona.display_name()
            ),
            None => "Persona cleared".to_string(),
        }
    }

    pub fn set_roleplay(&mut self, enabled: bool) -> String {
        let session = self.conversation.session_mut();
        session.roleplay_enabled = enabled;
        match (enabled, session.active_persona) {
            (true, Some(persona)) => format!("Roleplay on as {}", persona.display_name()),
            (true, None) => "Roleplay on (no persona selected; use /persona <id>)".to_string(),
            (false, _) => "Roleplay off".to_string(),
        }
    }

    /// Set a sampling or load parameter on the current session.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<String, ParamError> {
        let session = self.conversation.session_mut();
        if ModelParams::is_param(name) {
            session.model_params.set(name, value)?;
            let note = if self.models.is_loaded() {
                " (applies on next /load-model)"
            } else {
                ""
            };
            return Ok(format!("{} = {value}{note}", name.replace('-', "_")));
        }
        session.generation_settings.set(name, value)?;
        Ok(format!("{} = {value}", name.replace('-', "_")))
    }

    pub fn current_preset_id(&self) -> String {
        self.presets
            .detect_id(&self.session().generation_settings.sampling)
            .to_string()
    }

    pub fn apply_preset(&mut self, id: &str) -> Result<String, String> {
        let preset = self
            .presets
            .find_preset_by_id(id)
            .cloned()
            .ok_or_else(|| format!("Preset '{id}' not found. Use /preset to list presets"))?;
        self.conversation
            .session_mut()
            .generation_settings
            .sampling = preset.parameters;
        Ok(format!("Preset applied: {}", preset.name))
    }

    pub fn save_preset(&mut self, name: &str) -> Result<String, String> {
        let sampling = self.session().generation_settings.sampling;
        let id = self
            .presets
            .save_user_preset(name, "Saved from chat", sampling)?;
        let message = format!("Preset saved as '{id}'");
        Ok(self.sync_user_presets(message))
    }

    pub fn delete_preset(&mut self, id: &str) -> Result<String, String> {
        let removed = self.presets.delete_user_preset(id)?;
        let message = format!("Preset deleted: {}", removed.name);
        Ok(self.sync_user_presets(message))
    }

    fn sync_user_presets(&mut self, message: String) -> String {
        let user_presets: Vec<StylePreset> = self.presets.user_presets().to_vec();
        self.conversation.session_mut().user_presets = user_presets.clone();
        let persisted = self.config_store.mutate(|config| {
            config.presets = user_presets.clone();
            Ok(())
        });
        match persisted {
            Ok(()) => {
                self.config.presets = user_presets;
                message
            }
            Err(err) => {
                warn!(error = %err, "failed to persist presets");
                format!("{message} (not saved to config: {err})")
            }
        }
    }

    /// Save under `name`, or under the session's current name. A session
    /// without a name gets a timestamped one.
    ///
    /// The session keeps its previous name if the store rejects the new one.
    pub fn save_session(&mut self, name: Option<&str>) -> Result<RecordId, SessionStoreError> {
        let mut snapshot = self.session().clone();
        match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => snapshot.name = name.to_string(),
            None if snapshot.name.trim().is_empty() => {
                snapshot.name = RecordId::generated().to_string();
            }
            None => {}
        }
        snapshot.user_presets = self.presets.user_presets().to_vec();

        let record_id = self.store.save(&snapshot.name, &snapshot)?;
        let session = self.conversation.session_mut();
        session.name = snapshot.name;
        session.user_presets = snapshot.user_presets;
        Ok(record_id)
    }

    pub fn load_session(&mut self, name: &str) -> Result<String, Box<dyn std::error::Error>> {
        let session = self.store.load(name)?;
        self.presets.import(&session.user_presets);
        let message_count = session.message_count();
        let model_reference = session.model_reference.clone();
        let previous = self.conversation.replace_session(session)?;
        drop(previous);

        let mut message = format!("Loaded session '{name}' ({message_count} messages)");
        let loaded_path = self
            .models
            .info()
            .map(|info| info.path.to_string_lossy().into_owned());
        if !model_reference.is_empty() && loaded_path.as_deref() != Some(model_reference.as_str())
        {
            message.push_str(&format!(
                "\nRecorded with model {model_reference}; use /load-model to switch"
            ));
        }
        Ok(message)
    }

    pub fn delete_session(&mut self, name: &str) -> Result<(), SessionStoreError> {
        self.store.delete(name)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionStoreError> {
        self.store.list()
    }

    pub fn clear(&mut self) -> Result<(), ChatError> {
        self.conversation.clear()
    }

    /// Multi-line status summary for `/info`.
    pub fn status_text(&self) -> String {
        let session = self.session();
        let mut lines = Vec::new();
        match self.models.info() {
            Some(info) => lines.push(info.to_string()),
            None => lines.push("No model loaded".to_string()),
        }
        lines.push(format!(
            "Session: {} ({} messages)",
            if session.name.is_empty() {
                "(unsaved)"
            } else {
                session.name.as_str()
            },
            session.message_count()
        ));
        lines.push(format!(
            "Persona: {} (roleplay {})",
            session
                .active_persona
                .map(|p| p.display_name())
                .unwrap_or("none"),
            if session.roleplay_enabled { "on" } else { "off" }
        ));
        lines.push(format!("Preset: {}", self.current_preset_id()));
        for (name, value) in session.generation_settings.to_pairs() {
            lines.push(format!("  {name}: {value}"));
        }
        lines.push(format!("Load parameters: {}", session.model_params));
        lines.push(format!("Logging: {}", self.logging.get_status_string()));
        lines.join("\n")
    }
}

/// Fresh session seeded from config defaults.
pub fn new_session(config: &Config, catalog: &PersonaCatalog) -> Session {
    let mut session = Session::new("");
    session.active_persona = config
        .default_persona
        .as_deref()
        .and_then(|id| catalog.resolve(id));
    session.roleplay_enabled = config.roleplay_enabled();
    session.generation_settings = config.generation.clone();
    session.model_params = config.model_params.clone();
    session
}
