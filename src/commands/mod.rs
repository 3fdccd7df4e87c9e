mod registry;

pub use registry::{all_commands, matching_commands, CommandInvocation};

use crate::core::app::App;
use crate::core::generation::{GenerationSettings, ModelParams};
use crate::core::model_manager::available_models;
use crate::core::persona::Persona;
use crate::ui::format;
use std::path::PathBuf;

/// What the chat loop should do after a line of input.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    LoadModel(PathBuf),
    Eject,
    /// The transcript was replaced and should be shown again.
    ShowTranscript,
    Quit,
}

pub fn process_input(app: &mut App, input: &str) -> CommandResult {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(input.to_string());
    }

    let mut parts = trimmed[1..].splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => {
            let invocation = CommandInvocation {
                input: trimmed,
                args,
            };
            (command.handler)(app, invocation)
        }
        None => {
            let suggestions = matching_commands(command_name);
            if suggestions.is_empty() {
                app.notify(format!(
                    "Unknown command: /{command_name}. Type /help for commands"
                ));
            } else {
                app.notify(format!(
                    "Unknown command: /{command_name}. Did you mean /{}?",
                    suggestions.join(", /")
                ));
            }
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_help(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut help = String::from("Commands:");
    for command in all_commands() {
        for usage in command.usages {
            help.push_str(&format!("\n  {:<24} {}", usage.syntax, usage.description));
        }
    }
    help.push_str("\nAnything else is sent to the model.");
    app.notify(help);
    CommandResult::Continue
}

pub(super) fn handle_load_model(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify("Usage: /load-model <path>. Use /models to list available models");
        return CommandResult::Continue;
    }
    CommandResult::LoadModel(app.resolve_model_path(invocation.args))
}

pub(super) fn handle_eject(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    if !app.models.is_loaded() {
        app.notify("No model loaded");
        return CommandResult::Continue;
    }
    CommandResult::Eject
}

pub(super) fn handle_models(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let dir = app.config().resolved_models_dir();
    let message = match available_models(&dir) {
        Ok(models) if models.is_empty() => {
            format!("No .gguf files in {}", dir.display())
        }
        Ok(models) => {
            let mut out = format!("Models in {}:", dir.display());
            for model in models {
                if let Some(name) = model.file_name() {
                    out.push_str(&format!("\n  {}", name.to_string_lossy()));
                }
            }
            out
        }
        Err(err) => format!("Could not read {}: {err}", dir.display()),
    };
    app.notify(message);
    CommandResult::Continue
}

pub(super) fn handle_info(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    let status = app.status_text();
    app.notify(status);
    CommandResult::Continue
}

pub(super) fn handle_persona(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = invocation.args;
    if id.is_empty() {
        let list = format::persona_list(&app.catalog, app.session().active_persona);
        app.notify(list);
        return CommandResult::Continue;
    }
    if id.eq_ignore_ascii_case("none") || id.eq_ignore_ascii_case("off") {
        let message = app.set_persona(None);
        app.notify(message);
        return CommandResult::Continue;
    }
    let resolved: Option<Persona> = app.catalog.resolve(id);
    match resolved {
        Some(persona) => {
            let message = app.set_persona(Some(persona));
            app.notify(message);
        }
        None => {
            let available = app.catalog.available_ids();
            app.notify(format!("Unknown persona '{id}'. Available: {available}"));
        }
    }
    CommandResult::Continue
}

pub(super) fn handle_roleplay(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let current = app.session().roleplay_enabled;
    let enabled = match invocation.args.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => true,
        "off" | "false" | "no" => false,
        "" | "toggle" => !current,
        _ => {
            app.notify("Usage: /roleplay [on|off]");
            return CommandResult::Continue;
        }
    };
    let message = app.set_roleplay(enabled);
    app.notify(message);
    CommandResult::Continue
}

pub(super) fn handle_set(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let args = invocation.args;
    if args.is_empty() {
        let session = app.session();
        let mut out = String::from("Generation parameters:");
        for (name, value) in session.generation_settings.to_pairs() {
            out.push_str(&format!("\n  {name}: {value}"));
        }
        out.push_str(&format!("\nLoad parameters: {}", session.model_params));
        app.notify(out);
        return CommandResult::Continue;
    }

    let mut parts = args.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let value = parts.next().unwrap_or("").trim();
    let is_stop = name.eq_ignore_ascii_case("stop");
    if value.is_empty() && !is_stop {
        app.notify(format!(
            "Usage: /set <param> <value>. Parameters: {}, {}",
            GenerationSettings::PARAM_NAMES.join(", "),
            ModelParams::PARAM_NAMES.join(", ")
        ));
        return CommandResult::Continue;
    }

    match app.set_param(name, value) {
        Ok(message) => app.notify(message),
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_preset(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let mut parts = invocation.args.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    let result = match first {
        "" => {
            let active = app.current_preset_id();
            let list = format::preset_list(app.presets.list_presets(), &active);
            Ok(list)
        }
        "save" if !rest.is_empty() => app.save_preset(rest),
        "delete" | "remove" if !rest.is_empty() => app.delete_preset(rest),
        "save" => Err("Usage: /preset save <name>".to_string()),
        "delete" | "remove" => Err(format!("Usage: /preset {first} <id>")),
        id => app.apply_preset(id),
    };
    match result {
        Ok(message) | Err(message) => app.notify(message),
    }
    CommandResult::Continue
}

pub(super) fn handle_save(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let name = Some(invocation.args).filter(|name| !name.is_empty());
    match app.save_session(name) {
        Ok(record_id) => app.notify(format!("Session saved as '{record_id}'")),
        Err(err) => app.notify(format!("Save failed: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_load(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify("Usage: /load <name>. Use /sessions to list saved sessions");
        return CommandResult::Continue;
    }
    match app.load_session(invocation.args) {
        Ok(message) => {
            app.notify(message);
            CommandResult::ShowTranscript
        }
        Err(err) => {
            app.notify(format!("Load failed: {err}"));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_sessions(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    match app.list_sessions() {
        Ok(summaries) => {
            let list = format::session_list(&summaries);
            app.notify(list);
        }
        Err(err) => app.notify(format!("Could not list sessions: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_delete(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    if invocation.args.is_empty() {
        app.notify("Usage: /delete <name>");
        return CommandResult::Continue;
    }
    match app.delete_session(invocation.args) {
        Ok(()) => app.notify(format!("Session '{}' deleted", invocation.args)),
        Err(err) => app.notify(format!("Delete failed: {err}")),
    }
    CommandResult::Continue
}

pub(super) fn handle_clear(app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    match app.clear() {
        Ok(()) => app.notify("Transcript cleared"),
        Err(err) => app.notify(err.to_string()),
    }
    CommandResult::Continue
}

pub(super) fn handle_log(app: &mut App, invocation: CommandInvocation<'_>) -> CommandResult {
    let parts = invocation.arg_tokens();

    let message = match parts.as_slice() {
        [] => match app.logging.toggle_logging() {
            Ok(message) => message,
            Err(e) => format!("Log error: {e}"),
        },
        [filename] => match app.logging.set_log_file(filename.to_string()) {
            Ok(message) => message,
            Err(e) => format!("Logfile error: {e}"),
        },
        _ => "Usage: /log [filename]".to_string(),
    };
    app.notify(message);
    CommandResult::Continue
}

pub(super) fn handle_quit(_app: &mut App, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
