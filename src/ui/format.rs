//! Plain-text listings shared by the REPL and the CLI subcommands.

use crate::core::message::{Message, Role};
use crate::core::persona::{Persona, PersonaCatalog};
use crate::core::preset::StylePreset;
use crate::core::session_store::SessionSummary;
use chrono::Local;

pub fn session_line(summary: &SessionSummary) -> String {
    let saved = summary.saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    let persona = match (summary.persona, summary.roleplay_enabled) {
        (Some(persona), true) => format!(", {}", persona.display_name()),
        _ => String::new(),
    };
    let mut line = format!(
        "  {}  {}  {} messages{}",
        summary.record_id, saved, summary.message_count, persona
    );
    if !summary.preview.is_empty() {
        line.push_str(&format!("\n      \"{}\"", summary.preview));
    }
    line
}

pub fn session_list(summaries: &[SessionSummary]) -> String {
    if summaries.is_empty() {
        return "No saved sessions".to_string();
    }
    let mut out = String::from("Saved sessions:");
    for summary in summaries {
        out.push('\n');
        out.push_str(&session_line(summary));
    }
    out
}

pub fn persona_list(catalog: &PersonaCatalog, active: Option<Persona>) -> String {
    let mut out = String::from("Personas:");
    for persona in catalog.list() {
        let marker = if Some(*persona) == active { "*" } else { " " };
        out.push_str(&format!(
            "\n {marker} {:<18} {}",
            persona.id(),
            persona.display_name()
        ));
    }
    out
}

pub fn preset_list<'a>(
    presets: impl Iterator<Item = &'a StylePreset>,
    active_id: &str,
) -> String {
    let mut out = String::from("Presets:");
    for preset in presets {
        let marker = if preset.id == active_id { "*" } else { " " };
        out.push_str(&format!("\n {marker} {:<12} {}", preset.id, preset.name));
        if !preset.description.is_empty() {
            out.push_str(&format!(" - {}", preset.description));
        }
    }
    out
}

/// Label printed in front of a transcript message.
pub fn speaker_label(message: &Message, persona: Option<Persona>) -> &'static str {
    match message.role {
        Role::User => "You",
        Role::Assistant => persona.map(Persona::display_name).unwrap_or("Assistant"),
        Role::System => "*",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preset::PresetManager;
    use crate::core::session_store::RecordId;
    use chrono::Utc;

    #[test]
    fn session_list_handles_empty_and_entries() {
        assert_eq!(session_list(&[]), "No saved sessions");

        let summary = SessionSummary {
            record_id: RecordId::sanitize("test1").unwrap(),
            name: "test1".to_string(),
            saved_at: Utc::now(),
            message_count: 2,
            model_reference: String::new(),
            persona: Some(Persona::Pirate),
            roleplay_enabled: true,
            preview: "Hello".to_string(),
        };
        let text = session_list(&[summary]);
        assert!(text.contains("test1"));
        assert!(text.contains("2 messages, Pirate"));
        assert!(text.contains("\"Hello\""));
    }

    #[test]
    fn lists_mark_active_entries() {
        let catalog = PersonaCatalog::builtin().unwrap();
        let personas = persona_list(&catalog, Some(Persona::Detective));
        assert!(personas.contains("* detective"));
        assert!(personas.contains("  pirate"));

        let presets = PresetManager::new(Vec::new());
        let text = preset_list(presets.list_presets(), "creative");
        assert!(text.contains("* creative"));
        assert!(text.contains("  balanced"));
    }

    #[test]
    fn assistant_label_follows_persona() {
        let reply = Message::assistant("Arr");
        assert_eq!(speaker_label(&reply, Some(Persona::Pirate)), "Pirate");
        assert_eq!(speaker_label(&reply, None), "Assistant");
        assert_eq!(speaker_label(&Message::user("hi"), None), "You");
    }
}
