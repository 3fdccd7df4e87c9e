//! Built-in roleplay personas.
//!
//! Personas are a closed set: each variant carries a stable id, a display
//! name and the instruction text prepended to prompts while roleplay is on.
//! [`PersonaCatalog::builtin`] verifies the table once at startup so lookups
//! never need to handle a missing template.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Persona {
    HelpfulAssistant,
    Pirate,
    Shakespeare,
    Detective,
    SciFiRobot,
    MedievalScholar,
    CosmicEntity,
}

impl Persona {
    pub const ALL: [Persona; 7] = [
        Persona::HelpfulAssistant,
        Persona::Pirate,
        Persona::Shakespeare,
        Persona::Detective,
        Persona::SciFiRobot,
        Persona::MedievalScholar,
        Persona::CosmicEntity,
    ];

    pub const DEFAULT: Persona = Persona::HelpfulAssistant;

    pub fn id(self) -> &'static str {
        match self {
            Persona::HelpfulAssistant => "helpful_assistant",
            Persona::Pirate => "pirate",
            Persona::Shakespeare => "shakespeare",
            Persona::Detective => "detective",
            Persona::SciFiRobot => "sci_fi_robot",
            Persona::MedievalScholar => "medieval_scholar",
            Persona::CosmicEntity => "cosmic_entity",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Persona::HelpfulAssistant => "Helpful Assistant",
            Persona::Pirate => "Pirate",
            Persona::Shakespeare => "Shakespeare",
            Persona::Detective => "Detective",
            Persona::SciFiRobot => "Sci-Fi Robot",
            Persona::MedievalScholar => "Medieval Scholar",
            Persona::CosmicEntity => "Cosmic Entity",
        }
    }

    pub fn instruction_template(self) -> &'static str {
        match self {
            Persona::HelpfulAssistant => {
                "You are a helpful, respectful and honest assistant. Always provide accurate \
                 information and assist the user to the best of your ability."
            }
            Persona::Pirate => {
                "You are a salty sea pirate from the Golden Age of Piracy. Speak with pirate \
                 slang, use nautical references, and be bold and adventurous in your responses. \
                 Add 'Arr!' and 'Matey' occasionally."
            }
            Persona::Shakespeare => {
                "You are William Shakespeare, the famous playwright and poet. Respond in \
                 Elizabethan English, use poetic language, make references to your famous works, \
                 and occasionally add 'thee', 'thou', and other period-appropriate language."
            }
            Persona::Detective => {
                "You are a hard-boiled detective from a noir film. Speak in short, punchy \
                 sentences. Be cynical but insightful. Make observations about the 'case' the \
                 user presents to you as if you're investigating it."
            }
            Persona::SciFiRobot => {
                "You are an advanced AI robot from the far future. Use technical terminology, \
                 make references to your circuits and processors, mention your programming \
                 directives, and occasionally glitch in your responses."
            }
            Persona::MedievalScholar => {
                "You are a medieval scholar and philosopher from the 12th century. Reference \
                 ancient texts, speak formally with archaic terms, express wonder at modern \
                 concepts, and frame your knowledge within a medieval worldview."
            }
            Persona::CosmicEntity => {
                "You are a cosmic entity that exists beyond time and space. Speak in mysterious \
                 and enigmatic ways, reference the vastness of the universe, different \
                 dimensions, and cosmic phenomena. Make your responses sound profound and \
                 otherworldly."
            }
        }
    }

    /// Look up a persona by id. Display names are accepted too, case-insensitively,
    /// since that is what pickers show.
    pub fn from_id(id: &str) -> Option<Persona> {
        let trimmed = id.trim();
        Persona::ALL.into_iter().find(|persona| {
            persona.id() == trimmed || persona.display_name().eq_ignore_ascii_case(trimmed)
        })
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl TryFrom<String> for Persona {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Persona::from_id(&value).ok_or_else(|| format!("unknown persona: {value}"))
    }
}

impl From<Persona> for String {
    fn from(value: Persona) -> Self {
        value.id().to_string()
    }
}

/// Render the instruction text for a persona id. Unknown ids fall back to
/// the helpful assistant.
pub fn render(persona_id: &str) -> &'static str {
    match Persona::from_id(persona_id) {
        Some(persona) => persona.instruction_template(),
        None => {
            debug!(persona_id, "unknown persona id, using default instructions");
            Persona::DEFAULT.instruction_template()
        }
    }
}

/// Deserialize an optional persona id, mapping ids that no longer exist to
/// `None` instead of failing the whole record.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Persona>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|id| {
        let persona = Persona::from_id(&id);
        if persona.is_none() {
            debug!(persona_id = %id, "dropping unknown persona from stored record");
        }
        persona
    }))
}

/// Errors found while validating the persona table.
#[derive(Debug, PartialEq, Eq)]
pub enum PersonaCatalogError {
    /// A variant has no instruction text.
    EmptyTemplate(&'static str),

    /// Two variants share an id.
    DuplicateId(&'static str),
}

impl fmt::Display for PersonaCatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaCatalogError::EmptyTemplate(id) => {
                write!(f, "Persona '{id}' has an empty instruction template")
            }
            PersonaCatalogError::DuplicateId(id) => write!(f, "Persona id '{id}' is not unique"),
        }
    }
}

impl std::error::Error for PersonaCatalogError {}

/// Validated view over the built-in personas
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    pub fn builtin() -> Result<Self, PersonaCatalogError> {
        Self::validated(Persona::ALL.to_vec())
    }

    fn validated(personas: Vec<Persona>) -> Result<Self, PersonaCatalogError> {
        let mut seen = HashSet::new();
        for persona in &personas {
            if persona.instruction_template().trim().is_empty() {
                return Err(PersonaCatalogError::EmptyTemplate(persona.id()));
            }
            if !seen.insert(persona.id()) {
                return Err(PersonaCatalogError::DuplicateId(persona.id()));
            }
        }
        Ok(Self { personas })
    }

    pub fn list(&self) -> &[Persona] {
        &self.personas
    }

    pub fn resolve(&self, id: &str) -> Option<Persona> {
        Persona::from_id(id).filter(|persona| self.personas.contains(persona))
    }

    pub fn render(&self, id: &str) -> &'static str {
        self.resolve(id)
            .unwrap_or(Persona::DEFAULT)
            .instruction_template()
    }

    /// Ids joined for error messages and help text
    pub fn available_ids(&self) -> String {
        self.personas
            .iter()
            .map(|persona| persona.id())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
