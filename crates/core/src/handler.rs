use crate::error::EngineError;
use crate::types::Intent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a single capability-handler execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl HandlerOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// One concrete way of satisfying an intent (app launcher, browser driver,
/// shell wrapper, AI text generation, ...). Implementations are supplied by
/// the host; the engine treats them all identically and only ever holds them
/// behind this trait.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Static rank used to order fallback chains. Higher runs earlier.
    fn priority(&self) -> i32;

    fn can_handle(&self, intent: &Intent) -> bool;

    async fn execute(&self, intent: &Intent) -> Result<HandlerOutcome, EngineError>;
}
