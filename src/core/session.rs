use crate::core::generation::{GenerationSettings, ModelParams};
use crate::core::message::{Message, Role};
use crate::core::persona::{self, Persona};
use crate::core::preset::StylePreset;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

const PREVIEW_GRAPHEMES: usize = 50;

/// A conversation plus every setting needed to resume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Ids that no longer name a built-in persona load as `None`.
    #[serde(default, deserialize_with = "persona::deserialize_lenient")]
    pub active_persona: Option<Persona>,
    #[serde(default)]
    pub roleplay_enabled: bool,
    #[serde(default)]
    pub generation_settings: GenerationSettings,
    /// Path of the model the conversation was held with
    #[serde(default)]
    pub model_reference: String,
    #[serde(default)]
    pub model_params: ModelParams,
    #[serde(default)]
    pub user_presets: Vec<StylePreset>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
            active_persona: None,
            roleplay_enabled: false,
            generation_settings: GenerationSettings::default(),
            model_reference: String::new(),
            model_params: ModelParams::default(),
            user_presets: Vec::new(),
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Instructions to prepend to prompts, if roleplay is on and a persona
    /// is selected.
    pub fn persona_instructions(&self) -> Option<&'static str> {
        if !self.roleplay_enabled {
            return None;
        }
        self.active_persona.map(|persona| persona::render(persona.id()))
    }

    /// Short excerpt of the first user message for pickers
    pub fn preview(&self) -> String {
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return String::new();
        };
        truncate_graphemes(&first.content.replace('\n', " "), PREVIEW_GRAPHEMES)
    }
}

fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
