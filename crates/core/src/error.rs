use thiserror::Error;

/// Failure taxonomy for the resolution engine.
///
/// None of these are fatal to the host: classification ambiguity degrades to
/// the generic fallback, handler failures are recovered by walking the chain,
/// persistence failures are logged and the stores continue in memory.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Classification ambiguous: confidence {confidence:.2} below threshold")]
    ClassificationAmbiguous { confidence: f64 },

    #[error("Handler '{handler}' failed: {reason}")]
    HandlerFailure { handler: String, reason: String },

    #[error("No handler succeeded; attempted: {}", attempted.join(", "))]
    ChainExhausted { attempted: Vec<String> },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Performance threshold breached: {0}")]
    ThresholdBreach(String),

    #[error("Handler '{0}' timed out")]
    HandlerTimeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_exhausted_display_lists_handlers() {
        let err = EngineError::ChainExhausted {
            attempted: vec!["chrome".to_string(), "edge".to_string()],
        };
        assert_eq!(err.to_string(), "No handler succeeded; attempted: chrome, edge");
    }

    #[test]
    fn test_handler_failure_display() {
        let err = EngineError::HandlerFailure {
            handler: "app_launch".to_string(),
            reason: "binary not found".to_string(),
        };
        assert!(err.to_string().contains("app_launch"));
        assert!(err.to_string().contains("binary not found"));
    }
}
