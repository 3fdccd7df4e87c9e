//! `sessions` subcommand.

use std::error::Error;

use crate::core::config::data::path_display;
use crate::core::config::{Config, ConfigOrchestrator};
use crate::core::session::Session;
use crate::core::session_store::SessionStore;
use crate::ui::format::{session_list, speaker_label};

fn open_store() -> Result<SessionStore, Box<dyn Error>> {
    let config: Config = ConfigOrchestrator::for_default_path().load()?;
    Ok(SessionStore::new(
        config.resolved_sessions_dir(),
        config.max_sessions(),
    ))
}

pub fn list_sessions() -> Result<(), Box<dyn Error>> {
    let store = open_store()?;
    let summaries = store.list()?;
    println!("{}", session_list(&summaries));
    if !summaries.is_empty() {
        println!("\n💡 Resume one with:");
        println!("   ggufchat --session <name>");
    }
    println!("\nStored in {}", path_display(store.dir()));
    Ok(())
}

pub fn show_session(name: &str) -> Result<(), Box<dyn Error>> {
    let session = open_store()?.load(name)?;
    print!("{}", transcript(&session));
    Ok(())
}

pub fn delete_session(name: &str) -> Result<(), Box<dyn Error>> {
    open_store()?.delete(name)?;
    println!("✅ Deleted session '{name}'");
    Ok(())
}

fn transcript(session: &Session) -> String {
    let persona = session
        .active_persona
        .filter(|_| session.roleplay_enabled);

    let mut out = format!("Session: {}\n", session.name);
    if !session.model_reference.is_empty() {
        out.push_str(&format!("Model: {}\n", session.model_reference));
    }
    if let Some(persona) = persona {
        out.push_str(&format!("Persona: {}\n", persona.display_name()));
    }
    out.push('\n');
    for message in &session.messages {
        let label = speaker_label(message, persona);
        out.push_str(&format!("{label}: {}\n", message.content));
    }
    out
}
