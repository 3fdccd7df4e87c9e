//! `personas`, `presets` and `models` subcommands.

use std::error::Error;

use crate::core::config::data::path_display;
use crate::core::config::ConfigOrchestrator;
use crate::core::model_manager::{available_models, format_size};
use crate::core::persona::PersonaCatalog;
use crate::core::preset::PresetManager;
use crate::ui::format::{persona_list, preset_list};

pub fn list_personas() -> Result<(), Box<dyn Error>> {
    let catalog = PersonaCatalog::builtin()?;
    let config = ConfigOrchestrator::for_default_path().load()?;
    let default = config
        .default_persona
        .as_deref()
        .and_then(|id| catalog.resolve(id));

    println!("{}", persona_list(&catalog, default));
    println!("\n💡 Start a roleplay chat with:");
    println!("   ggufchat --persona pirate --roleplay");
    Ok(())
}

pub fn list_presets() -> Result<(), Box<dyn Error>> {
    let config = ConfigOrchestrator::for_default_path().load()?;
    let presets = PresetManager::new(config.presets.clone());
    let active = presets.detect_id(&config.generation.sampling).to_string();

    println!("{}", preset_list(presets.list_presets(), &active));
    Ok(())
}

pub fn list_models() -> Result<(), Box<dyn Error>> {
    let config = ConfigOrchestrator::for_default_path().load()?;
    let dir = config.resolved_models_dir();
    println!("Available models (from {}):\n", path_display(&dir));

    let models = available_models(&dir)?;
    if models.is_empty() {
        println!("  No .gguf files found.");
        println!("\n💡 Point ggufchat at your models with:");
        println!("   ggufchat set models-dir ~/models");
        return Ok(());
    }
    for model in models {
        let name = model
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = std::fs::metadata(&model)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "?".to_string());
        println!("  • {name} ({size})");
    }
    println!("\n💡 Chat with a model:");
    println!("   ggufchat -m <path>");
    Ok(())
}
