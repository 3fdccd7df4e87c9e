pub mod data;
pub mod io;
pub mod orchestrator;

pub use data::{Config, ServerConfig};
pub use io::ConfigError;
pub use orchestrator::ConfigOrchestrator;
