//! ggufchat is a terminal chat front-end for local GGUF language models.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation, the persona catalog, the session store,
//!   generation settings and the llama.cpp server that runs the model.
//! - [`commands`] implements slash-command parsing and execution for the
//!   chat loop.
//! - [`ui`] runs the line-oriented chat loop and formats listings.
//! - [`cli`] parses arguments and runs the one-shot subcommands.
//!
//! The binary (`src/main.rs`) calls [`crate::cli::main`], which dispatches
//! into [`ui::chat_loop`] for interactive sessions.

pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
