//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and dispatches to the chat loop
//! or to one of the one-shot subcommands.

pub mod inspect;
pub mod listings;
pub mod say;
pub mod session_list;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::inspect::inspect_model;
use crate::cli::listings::{list_models, list_personas, list_presets};
use crate::cli::say::run_say;
use crate::cli::session_list::{delete_session, list_sessions, show_session};
use crate::cli::settings::{SetContext, SettingRegistry};
use crate::core::app::AppInitConfig;
use crate::core::config::ConfigOrchestrator;
use crate::ui::chat_loop::run_chat;

/// Environment variable holding the tracing filter, e.g. `GGUFCHAT_LOG=debug`.
pub const LOG_ENV: &str = "GGUFCHAT_LOG";

#[derive(Parser)]
#[command(name = "ggufchat", version)]
#[command(about = "Chat with local GGUF models through llama.cpp")]
#[command(
    long_about = "ggufchat is a terminal chat front-end for local GGUF language models. \
It launches a llama.cpp server for the selected model and talks to it over HTTP.\n\n\
Commands inside the chat:\n\
  /help                 List all commands\n\
  /load-model <path>    Load a GGUF model\n\
  /persona <id>         Select a persona (see 'ggufchat personas')\n\
  /roleplay on|off      Apply the persona to prompts\n\
  /set <param> <value>  Change a generation parameter\n\
  /save [name]          Save the conversation\n\
  /load <name>          Load a saved conversation\n\n\
Environment:\n\
  GGUFCHAT_CONFIG_DIR   Directory holding config.toml\n\
  GGUFCHAT_DATA_DIR     Base directory for sessions and models\n\
  GGUFCHAT_LOG          Diagnostic log filter (default: warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub chat: ChatArgs,
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct ChatArgs {
    /// GGUF model to load at startup
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// Persona id to start with
    #[arg(long, global = true, value_name = "ID")]
    pub persona: Option<String>,

    /// Apply the persona's instructions to prompts
    #[arg(short = 'r', long, global = true)]
    pub roleplay: bool,

    /// Saved session to resume
    #[arg(short = 's', long, global = true, value_name = "NAME")]
    pub session: Option<String>,

    /// Append the transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

impl ChatArgs {
    fn into_init_config(self) -> AppInitConfig {
        AppInitConfig {
            model: self.model,
            log_file: self.log,
            persona: self.persona,
            roleplay: self.roleplay,
            session: self.session,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send one prompt and print the reply
    Say {
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List, show or delete saved sessions
    Sessions {
        #[command(subcommand)]
        command: Option<SessionCommands>,
    },
    /// List available personas
    Personas,
    /// List style presets
    Presets,
    /// List GGUF files in the models directory
    Models,
    /// Print the header metadata of a GGUF file
    Inspect {
        /// Path to a .gguf file
        path: PathBuf,
        /// Show every metadata key
        #[arg(short, long)]
        all: bool,
    },
    /// Show the configuration file location and current settings
    Config,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SessionCommands {
    /// List saved sessions (default)
    List,
    /// Print a saved session's transcript
    Show { name: String },
    /// Delete a saved session
    Delete { name: String },
}

/// Route diagnostics to stderr so they never mix with chat output.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(args.chat.into_init_config()).await,
        Commands::Say { prompt } => run_say(prompt, args.chat.into_init_config()).await,
        Commands::Sessions { command } => match command.unwrap_or(SessionCommands::List) {
            SessionCommands::List => list_sessions(),
            SessionCommands::Show { name } => show_session(&name),
            SessionCommands::Delete { name } => delete_session(&name),
        },
        Commands::Personas => list_personas(),
        Commands::Presets => list_presets(),
        Commands::Models => list_models(),
        Commands::Inspect { path, all } => inspect_model(&path, all),
        Commands::Config => show_config(),
        Commands::Set { key, value } => {
            let registry = SettingRegistry::new();
            let orchestrator = ConfigOrchestrator::for_default_path();
            let config = orchestrator.load()?;
            let mut ctx = SetContext {
                config: &config,
                orchestrator: &orchestrator,
            };
            match registry.get(&key) {
                Some(handler) => match handler.set(&value, &mut ctx) {
                    Ok(message) => println!("{message}"),
                    Err(err) => {
                        err.print();
                        std::process::exit(err.exit_code());
                    }
                },
                None => {
                    settings::SettingError::UnknownKey(key).print();
                    eprintln!("   Known keys: {}", registry.keys_sorted().join(", "));
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let registry = SettingRegistry::new();
            let orchestrator = ConfigOrchestrator::for_default_path();
            let config = orchestrator.load()?;
            let mut ctx = SetContext {
                config: &config,
                orchestrator: &orchestrator,
            };
            match registry.get(&key) {
                Some(handler) => match handler.unset(&mut ctx) {
                    Ok(message) => println!("{message}"),
                    Err(err) => {
                        err.print();
                        std::process::exit(err.exit_code());
                    }
                },
                None => {
                    settings::SettingError::UnknownKey(key).print();
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}

fn show_config() -> Result<(), Box<dyn Error>> {
    let orchestrator = ConfigOrchestrator::for_default_path();
    let config = orchestrator.load()?;
    let registry = SettingRegistry::new();

    println!(
        "Config file: {}",
        crate::core::config::data::path_display(orchestrator.path())
    );
    println!(
        "Sessions: {}",
        crate::core::config::data::path_display(config.resolved_sessions_dir())
    );
    println!(
        "Models: {}",
        crate::core::config::data::path_display(config.resolved_models_dir())
    );
    println!();
    println!("Current settings:");
    for key in registry.keys_display_order() {
        if let Some(handler) = registry.get(key) {
            println!("{}", handler.format(&config));
        }
    }
    if !config.presets.is_empty() {
        println!("  user presets: {}", config.presets.len());
    }
    Ok(())
}
