//! `say` subcommand: one prompt, one reply, then exit.

use std::error::Error;

use reqwest::Client;
use tracing::debug;

use crate::core::app::{App, AppInitConfig};
use crate::core::config::ConfigOrchestrator;

pub async fn run_say(prompt: Vec<String>, init: AppInitConfig) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("No prompt given. Usage: ggufchat say -m <model> <prompt>".into());
    }

    let config_store = ConfigOrchestrator::for_default_path();
    let config = config_store.load()?;
    let mut app = App::new(init, config, config_store, Client::new())?;

    let Some(path) = app.take_startup_model() else {
        return Err(
            "No model selected. Pass -m <path> or run 'ggufchat set default-model <path>'".into(),
        );
    };
    let loaded = app.load_model(&path).await?;
    debug!("{loaded}");

    let result = app.submit(&prompt).await;
    app.models.unload().await;

    let reply = result?;
    println!("{}", reply.content);
    Ok(())
}
