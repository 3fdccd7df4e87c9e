pub mod app;
pub mod builtin_presets;
pub mod chat;
pub mod config;
pub mod generation;
pub mod gguf;
pub mod message;
pub mod model_manager;
pub mod persona;
pub mod preset;
pub mod runner;
pub mod session;
pub mod session_store;
