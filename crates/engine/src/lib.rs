pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod runner;

pub use config::EngineConfig;
pub use orchestrator::Orchestrator;
pub use registry::HandlerRegistry;
pub use runner::Engine;
