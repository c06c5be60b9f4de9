//! Registry of capability handlers indexed by intent pattern.
//!
//! Built during a serialized startup phase, then shared read-only behind an
//! `Arc` snapshot. Lookups never take a lock.

use concierge_types::dispatch::{ConfidenceTier, HandlerInfo, MatchResult};
use concierge_types::error::RegistryError;
use concierge_types::intent::Intent;

use super::capability::{BoxHandler, CapabilityHandler};
use super::scoring::{best_pattern, IntentPattern, MessageTokens};

/// Everything needed to register one handler.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub name: String,
    pub intent: Intent,
    /// Phrases scored against incoming messages, in declaration order.
    pub patterns: Vec<String>,
    /// Higher wins when two handlers score the same.
    pub priority: i32,
    pub handler: BoxHandler,
}

impl HandlerDescriptor {
    pub fn new<H, I, S>(name: impl Into<String>, intent: Intent, patterns: I, handler: H) -> Self
    where
        H: CapabilityHandler + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            intent,
            patterns: patterns.into_iter().map(Into::into).collect(),
            priority: 0,
            handler: BoxHandler::new(handler),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone)]
struct RegisteredHandler {
    descriptor: HandlerDescriptor,
    compiled: Vec<IntentPattern>,
    order: usize,
}

/// Owns the registered handlers and finds the best one for a message.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<RegisteredHandler>,
    match_threshold: f64,
}

impl HandlerRegistry {
    pub fn new(match_threshold: f64) -> Self {
        Self {
            handlers: Vec::new(),
            match_threshold,
        }
    }

    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    /// Register a handler.
    ///
    /// Malformed patterns are dropped with a warning. A descriptor with no
    /// patterns at all, or with nothing but malformed ones, is rejected.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<(), RegistryError> {
        if descriptor.patterns.is_empty() {
            return Err(RegistryError::EmptyPatterns(descriptor.name));
        }
        if self.handlers.iter().any(|h| h.descriptor.name == descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }

        let mut compiled = Vec::with_capacity(descriptor.patterns.len());
        let mut kept = Vec::with_capacity(descriptor.patterns.len());
        for raw in &descriptor.patterns {
            match IntentPattern::parse(raw) {
                Some(pattern) => {
                    compiled.push(pattern);
                    kept.push(raw.clone());
                }
                None => {
                    tracing::warn!(
                        handler = %descriptor.name,
                        pattern = %raw,
                        "skipping malformed intent pattern"
                    );
                }
            }
        }
        if compiled.is_empty() {
            return Err(RegistryError::NoValidPatterns(descriptor.name));
        }

        let order = self.handlers.len();
        tracing::debug!(
            handler = %descriptor.name,
            intent = %descriptor.intent,
            patterns = compiled.len(),
            priority = descriptor.priority,
            "registered handler"
        );
        self.handlers.push(RegisteredHandler {
            descriptor: HandlerDescriptor {
                patterns: kept,
                ..descriptor
            },
            compiled,
            order,
        });
        Ok(())
    }

    /// Highest-scoring handler whose score clears the match threshold.
    ///
    /// Ties go to the higher priority, then to the earlier registration.
    pub fn find_handler(&self, message: &str) -> Option<MatchResult> {
        let tokens = MessageTokens::new(message);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&RegisteredHandler, usize, f64)> = None;
        for handler in &self.handlers {
            let Some((pattern_idx, score)) = best_pattern(&tokens, &handler.compiled) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((current, _, current_score)) => {
                    score > current_score
                        || (score == current_score
                            && handler.descriptor.priority > current.descriptor.priority)
                }
            };
            if better {
                best = Some((handler, pattern_idx, score));
            }
        }

        let (handler, pattern_idx, score) = best?;
        if score <= 0.0 || score < self.match_threshold {
            tracing::debug!(
                best = %handler.descriptor.name,
                score,
                threshold = self.match_threshold,
                "no handler cleared the match threshold"
            );
            return None;
        }

        Some(MatchResult {
            handler: handler.descriptor.name.clone(),
            handler_index: handler.order,
            score,
            confidence: ConfidenceTier::from_score(score),
            matched_pattern: handler.descriptor.patterns[pattern_idx].clone(),
        })
    }

    /// The callable for a registered handler.
    pub fn handler(&self, name: &str) -> Option<&BoxHandler> {
        self.handlers
            .iter()
            .find(|h| h.descriptor.name == name)
            .map(|h| &h.descriptor.handler)
    }

    pub fn list_handlers(&self) -> Vec<HandlerInfo> {
        self.handlers.iter().map(Self::info).collect()
    }

    pub fn get_handler_info(&self, name: &str) -> Result<HandlerInfo, RegistryError> {
        self.handlers
            .iter()
            .find(|h| h.descriptor.name == name)
            .map(Self::info)
            .ok_or_else(|| RegistryError::UnknownHandler(name.to_string()))
    }

    /// Intents that have at least one registered handler.
    pub fn covered_intents(&self) -> impl Iterator<Item = &Intent> {
        self.handlers.iter().map(|h| &h.descriptor.intent)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn info(handler: &RegisteredHandler) -> HandlerInfo {
        HandlerInfo {
            name: handler.descriptor.name.clone(),
            intent: handler.descriptor.intent.clone(),
            patterns: handler.descriptor.patterns.clone(),
            priority: handler.descriptor.priority,
            registration_order: handler.order,
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::capability::FnHandler;
    use concierge_types::dispatch::DispatchRequest;

    fn desc(name: &str, intent: Intent, patterns: &[&str], text: &'static str) -> HandlerDescriptor {
        HandlerDescriptor::new(
            name,
            intent,
            patterns.iter().copied(),
            FnHandler::new(move |_: &DispatchRequest| Ok(text.to_string())),
        )
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new(0.5);
        registry
            .register(desc(
                "reminder_handler",
                Intent::CreateReminder,
                &["schedule reminder"],
                "reminder set",
            ))
            .unwrap();
        registry
            .register(desc(
                "greeting_handler",
                Intent::Greeting,
                &["hello", "good morning"],
                "hi!",
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_reminder_scenario_matches() {
        let result = registry()
            .find_handler("schedule a reminder for my appointment")
            .unwrap();
        assert_eq!(result.handler, "reminder_handler");
        assert!((result.score - 0.8).abs() < 1e-9);
        assert_eq!(result.confidence, ConfidenceTier::Medium);
        assert_eq!(result.matched_pattern, "schedule reminder");
    }

    #[test]
    fn test_rejects_empty_and_duplicate_descriptors() {
        let mut registry = registry();
        let empty = desc("empty", Intent::Help, &[], "x");
        assert!(matches!(registry.register(empty), Err(RegistryError::EmptyPatterns(_))));

        let junk = desc("junk", Intent::Help, &["", "!!"], "x");
        assert!(matches!(registry.register(junk), Err(RegistryError::NoValidPatterns(_))));

        let dup = desc("greeting_handler", Intent::Greeting, &["hey"], "x");
        assert!(matches!(registry.register(dup), Err(RegistryError::DuplicateName(_))));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_malformed_patterns_are_skipped() {
        let mut registry = HandlerRegistry::new(0.5);
        registry
            .register(desc("help", Intent::Help, &["   ", "help"], "x"))
            .unwrap();
        let info = registry.get_handler_info("help").unwrap();
        assert_eq!(info.patterns, vec!["help".to_string()]);
    }

    #[test]
    fn test_below_threshold_returns_none() {
        // "schedule the meeting" overlaps one of two keywords: 0.4 < 0.5.
        assert!(registry().find_handler("schedule the meeting").is_none());
        assert!(registry().find_handler("").is_none());
    }

    #[test]
    fn test_never_returns_score_below_threshold() {
        let messages = [
            "hello",
            "schedule",
            "reminder please",
            "good evening",
            "morning schedule",
            "what is the weather",
            "schedule a reminder to say hello",
        ];
        for threshold in [0.1, 0.3, 0.5, 0.8, 1.0] {
            let mut registry = registry();
            registry.match_threshold = threshold;
            for message in messages {
                if let Some(result) = registry.find_handler(message) {
                    assert!(
                        result.score >= threshold,
                        "{message:?} matched {} at {} < {threshold}",
                        result.handler,
                        result.score
                    );
                }
            }
        }
    }

    #[test]
    fn test_tie_breaks_on_priority_then_registration_order() {
        let mut registry = HandlerRegistry::new(0.5);
        registry
            .register(desc("first", Intent::Help, &["help"], "1"))
            .unwrap();
        registry
            .register(desc("second", Intent::Help, &["help"], "2"))
            .unwrap();
        assert_eq!(registry.find_handler("help me").unwrap().handler, "first");

        registry
            .register(desc("urgent", Intent::Help, &["help"], "3").with_priority(10))
            .unwrap();
        assert_eq!(registry.find_handler("help me").unwrap().handler, "urgent");
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let registry = registry();
        let first = registry.find_handler("hello, schedule reminder");
        for _ in 0..20 {
            assert_eq!(registry.find_handler("hello, schedule reminder"), first);
        }
    }

    #[test]
    fn test_introspection() {
        let registry = registry();
        let all = registry.list_handlers();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name, "greeting_handler");
        assert_eq!(all[1].registration_order, 1);
        assert!(matches!(
            registry.get_handler_info("nope"),
            Err(RegistryError::UnknownHandler(_))
        ));
    }
}
