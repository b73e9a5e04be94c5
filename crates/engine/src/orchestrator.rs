use crate::config::EngineConfig;
use crate::registry::HandlerRegistry;
use reflex_core::{
    ActionRecord, CapabilityHandler, EngineError, HandlerOutcome, Intent, PreferenceRecord,
    RequestSignature, ResolveOutcome,
};
use reflex_intent::IntentClassifier;
use reflex_memory::MemoryStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Sentinel recorded when a whole chain failed.
const NO_HANDLER: &str = "none";
const MAX_ALTERNATIVE_SUGGESTIONS: usize = 3;

/// Walks the ranked fallback chain for each request, learning and replaying
/// the user's past choices. Handler execution is awaited sequentially; the
/// first success short-circuits the chain.
pub struct Orchestrator {
    classifier: IntentClassifier,
    registry: HandlerRegistry,
    memory: Arc<MemoryStore>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        registry: HandlerRegistry,
        memory: Arc<MemoryStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            classifier,
            registry,
            memory,
            config,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Resolve one free-text request. Never fails the caller: every failure
    /// path degrades to a `ResolveOutcome` with `success = false`.
    pub async fn resolve(
        &self,
        text: &str,
        context: HashMap<String, String>,
    ) -> ResolveOutcome {
        let started = Instant::now();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let signature = RequestSignature::of(text);

        let duplicate_advisory = self.duplicate_advisory(&signature).await;
        if duplicate_advisory.is_some() {
            debug!(%signature, "duplicate request detected, advising but not blocking");
        }

        let intent = self.classifier.classify(text);
        info!(
            intent = %intent.intent_type,
            confidence = intent.confidence,
            "classified request"
        );

        let mut outcome = if intent.confidence < self.config.low_confidence_threshold {
            self.resolve_via_generic(&intent, &signature, now_ms).await
        } else {
            self.resolve_via_chain(&intent, &signature, now_ms).await
        };
        outcome.duplicate_advisory = duplicate_advisory;

        self.memory
            .append_action(ActionRecord {
                id: 0,
                command: reflex_core::normalize_text(text),
                context,
                timestamp_ms: now_ms,
                success: outcome.success,
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await;

        outcome
    }

    /// Non-blocking advisory when the identical signature was resolved within
    /// the last few actions.
    async fn duplicate_advisory(&self, signature: &RequestSignature) -> Option<String> {
        let recent = self
            .memory
            .recent_actions(self.config.duplicate_window)
            .await;
        recent
            .iter()
            .any(|a| &RequestSignature::of(&a.command) == signature)
            .then(|| "This was just done recently. Repeating anyway.".to_string())
    }

    /// Low-confidence short circuit: skip the chain and hand the request to
    /// the lowest-priority generic handler.
    async fn resolve_via_generic(
        &self,
        intent: &Intent,
        signature: &RequestSignature,
        now_ms: i64,
    ) -> ResolveOutcome {
        debug!(
            confidence = intent.confidence,
            "confidence below threshold, using generic fallback"
        );

        let Some(generic) = self.registry.generic_fallback() else {
            return ResolveOutcome {
                success: false,
                message: "No handlers registered".to_string(),
                handler_used: None,
                fallback_used: true,
                duplicate_advisory: None,
                suggestions: Vec::new(),
            };
        };

        let name = generic.name().to_string();
        match self.execute_bounded(generic, intent).await {
            Ok(result) if result.success => {
                self.record_choice(signature, &name, now_ms, true).await;
                ResolveOutcome {
                    success: true,
                    message: result.message,
                    handler_used: Some(name),
                    fallback_used: true,
                    duplicate_advisory: None,
                    suggestions: Vec::new(),
                }
            }
            Ok(result) => {
                self.record_choice(signature, NO_HANDLER, now_ms, false).await;
                ResolveOutcome {
                    success: false,
                    message: format!("Generic handler failed: {}", result.message),
                    handler_used: None,
                    fallback_used: true,
                    duplicate_advisory: None,
                    suggestions: Vec::new(),
                }
            }
            Err(e) => {
                self.record_choice(signature, NO_HANDLER, now_ms, false).await;
                ResolveOutcome {
                    success: false,
                    message: format!("Generic handler failed: {}", e),
                    handler_used: None,
                    fallback_used: true,
                    duplicate_advisory: None,
                    suggestions: Vec::new(),
                }
            }
        }
    }

    async fn resolve_via_chain(
        &self,
        intent: &Intent,
        signature: &RequestSignature,
        now_ms: i64,
    ) -> ResolveOutcome {
        let chain = self.build_chain(intent, signature).await;
        let mut attempted: Vec<String> = Vec::new();

        for handler in &chain {
            if !handler.can_handle(intent) {
                continue;
            }
            let name = handler.name().to_string();
            attempted.push(name.clone());

            match self.execute_bounded(handler.clone(), intent).await {
                Ok(result) if result.success => {
                    let fallback_used = attempted.len() > 1;
                    if fallback_used {
                        info!(handler = %name, "fallback handler succeeded");
                    }
                    self.record_choice(signature, &name, now_ms, true).await;
                    return ResolveOutcome {
                        success: true,
                        message: result.message,
                        handler_used: Some(name),
                        fallback_used,
                        duplicate_advisory: None,
                        suggestions: Vec::new(),
                    };
                }
                Ok(result) => {
                    warn!(handler = %name, "handler reported failure: {}", result.message);
                }
                Err(e) => {
                    warn!(handler = %name, "handler errored: {}", e);
                }
            }
        }

        self.record_choice(signature, NO_HANDLER, now_ms, false).await;
        let err = EngineError::ChainExhausted {
            attempted: attempted.clone(),
        };
        error!("{}", err);

        ResolveOutcome {
            success: false,
            message: if attempted.is_empty() {
                format!("No handler available for intent '{}'", intent.intent_type)
            } else {
                err.to_string()
            },
            handler_used: None,
            fallback_used: attempted.len() > 1,
            duplicate_advisory: None,
            suggestions: self.alternatives(&attempted),
        }
    }

    /// Ranked chain for one resolution attempt: learned preference first,
    /// then the static per-intent ordering, then remaining handlers by
    /// priority with most-recent-success breaking ties. No handler appears
    /// twice.
    async fn build_chain(
        &self,
        intent: &Intent,
        signature: &RequestSignature,
    ) -> Vec<Arc<dyn CapabilityHandler>> {
        let mut chain: Vec<Arc<dyn CapabilityHandler>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(pref) = self.memory.get_preference(signature).await {
            if pref.success && pref.chosen_handler != NO_HANDLER {
                if let Some(handler) = self.registry.get(&pref.chosen_handler) {
                    debug!(handler = %pref.chosen_handler, "promoting learned preference to rank 0");
                    seen.insert(pref.chosen_handler.clone());
                    chain.push(handler);
                }
            }
        }

        if let Some(names) = self.config.intent_chains.get(&intent.intent_type) {
            for name in names {
                if seen.contains(name) {
                    continue;
                }
                if let Some(handler) = self.registry.get(name) {
                    seen.insert(name.clone());
                    chain.push(handler);
                }
            }
        }

        // Dynamically appended alternates, ranked by static priority with
        // the most recently successful handler winning ties
        let mut rest: Vec<(Arc<dyn CapabilityHandler>, i64)> = Vec::new();
        for handler in self.registry.all() {
            if seen.contains(handler.name()) {
                continue;
            }
            let last_success = self
                .memory
                .last_success_ms(handler.name())
                .await
                .unwrap_or(i64::MIN);
            rest.push((handler.clone(), last_success));
        }
        rest.sort_by(|(a, a_ts), (b, b_ts)| {
            b.priority()
                .cmp(&a.priority())
                .then(b_ts.cmp(a_ts))
        });
        chain.extend(rest.into_iter().map(|(h, _)| h));

        chain
    }

    /// Up to three alternative handler names, by static priority, excluding
    /// everything already attempted.
    fn alternatives(&self, attempted: &[String]) -> Vec<String> {
        self.registry
            .by_priority()
            .into_iter()
            .map(|h| h.name().to_string())
            .filter(|name| !attempted.contains(name))
            .take(MAX_ALTERNATIVE_SUGGESTIONS)
            .collect()
    }

    /// Run one handler under the configured timeout, in its own task so a
    /// panicking handler cannot take the engine down.
    async fn execute_bounded(
        &self,
        handler: Arc<dyn CapabilityHandler>,
        intent: &Intent,
    ) -> Result<HandlerOutcome, EngineError> {
        let name = handler.name().to_string();
        let intent = intent.clone();
        let handle = tokio::spawn(async move { handler.execute(&intent).await });

        match timeout(Duration::from_millis(self.config.handler_timeout_ms), handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    "panicked"
                } else {
                    "cancelled"
                };
                error!(handler = %name, "handler task {}", reason);
                Err(EngineError::HandlerFailure {
                    handler: name,
                    reason: reason.to_string(),
                })
            }
            Err(_) => {
                warn!(handler = %name, "handler timed out");
                Err(EngineError::HandlerTimeout(name))
            }
        }
    }

    async fn record_choice(
        &self,
        signature: &RequestSignature,
        handler: &str,
        now_ms: i64,
        success: bool,
    ) {
        self.memory
            .upsert_preference(PreferenceRecord {
                signature: signature.clone(),
                chosen_handler: handler.to_string(),
                timestamp_ms: now_ms,
                success,
            })
            .await;
    }
}
