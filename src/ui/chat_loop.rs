//! Line-oriented chat loop.
//!
//! Reads one line at a time from stdin, routes slash commands through
//! [`crate::commands::process_input`] and sends everything else to the
//! loaded model. Generation is awaited in place; there is one turn at a time.

use crate::commands::{process_input, CommandResult};
use crate::core::app::{App, AppInitConfig};
use crate::core::config::ConfigOrchestrator;
use crate::ui::format::speaker_label;
use reqwest::Client;
use std::error::Error;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const PROMPT: &str = "> ";

pub async fn run_chat(init: AppInitConfig) -> Result<(), Box<dyn Error>> {
    let config_store = ConfigOrchestrator::for_default_path();
    let config = config_store.load()?;
    let mut app = App::new(init, config, config_store, Client::new())?;

    println!("ggufchat {}. Type /help for commands.", env!("CARGO_PKG_VERSION"));
    if !app.session().messages.is_empty() {
        print_transcript(&app);
    }

    if let Some(path) = app.take_startup_model() {
        load_model(&mut app, &path).await;
    } else {
        println!("No model loaded. Use /load-model <path> or /models.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let action = process_input(&mut app, &line);
        print_notices(&mut app);
        match action {
            CommandResult::Continue => {}
            CommandResult::ProcessAsMessage(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                send_message(&mut app, &text).await;
            }
            CommandResult::LoadModel(path) => load_model(&mut app, &path).await,
            CommandResult::Eject => {
                if let Some(message) = app.eject().await {
                    println!("{message}");
                }
            }
            CommandResult::ShowTranscript => print_transcript(&app),
            CommandResult::Quit => break,
        }
    }

    debug!("leaving chat loop");
    app.models.unload().await;
    Ok(())
}

async fn send_message(app: &mut App, text: &str) {
    println!("...");
    match app.submit(text).await {
        Ok(reply) => {
            let label = speaker_label(&reply, roleplay_persona(app));
            println!("{label}: {}\n", reply.content);
        }
        Err(err) => eprintln!("Error: {err}"),
    }
}

async fn load_model(app: &mut App, path: &Path) {
    println!("Loading {} ...", path.display());
    match app.load_model(path).await {
        Ok(summary) => println!("{summary}"),
        Err(err) => eprintln!("Error: {err}"),
    }
}

fn roleplay_persona(app: &App) -> Option<crate::core::persona::Persona> {
    let session = app.session();
    session
        .active_persona
        .filter(|_| session.roleplay_enabled)
}

fn print_notices(app: &mut App) {
    for notice in app.take_notices() {
        println!("{notice}");
    }
}

fn print_transcript(app: &App) {
    let persona = roleplay_persona(app);
    for message in &app.session().messages {
        println!("{}: {}", speaker_label(message, persona), message.content);
    }
    println!();
}
