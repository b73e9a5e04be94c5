pub mod error;
pub mod handler;
pub mod signature;
pub mod types;

pub use error::EngineError;
pub use handler::{CapabilityHandler, HandlerOutcome};
pub use signature::{normalize_text, RequestSignature};
pub use types::*;
