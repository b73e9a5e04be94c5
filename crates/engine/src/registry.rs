use reflex_core::CapabilityHandler;
use std::sync::Arc;
use tracing::debug;

/// Ordered collection of the host's capability handlers. Immutable after
/// registration; the orchestrator only ever reads it.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn CapabilityHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler. A handler with the same name replaces the earlier
    /// registration.
    pub fn register(&mut self, handler: Arc<dyn CapabilityHandler>) {
        debug!(handler = handler.name(), priority = handler.priority(), "registered handler");
        self.handlers.retain(|h| h.name() != handler.name());
        self.handlers.push(handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.iter().find(|h| h.name() == name).cloned()
    }

    pub fn all(&self) -> &[Arc<dyn CapabilityHandler>] {
        &self.handlers
    }

    /// Handlers ordered by descending static priority.
    pub fn by_priority(&self) -> Vec<Arc<dyn CapabilityHandler>> {
        let mut sorted = self.handlers.clone();
        sorted.sort_by_key(|h| std::cmp::Reverse(h.priority()));
        sorted
    }

    /// The lowest-priority handler, treated as the guaranteed-available
    /// generic fallback for low-confidence requests.
    pub fn generic_fallback(&self) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.iter().min_by_key(|h| h.priority()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
