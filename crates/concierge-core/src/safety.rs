//! Collaborator trait for the safety/therapeutic-content layer.
//!
//! That layer owns the crisis-keyword list and the deterministic text
//! returned in degraded mode. The core only reads them.

use concierge_types::dispatch::DispatchRequest;

use crate::handler::scoring::{contains_phrase, tokenize};

pub trait SafetyContent: Send + Sync {
    /// Phrases that mark a message as crisis-relevant.
    fn crisis_keywords(&self) -> &[String];

    /// Local response used when no provider could answer.
    ///
    /// Must be non-empty and must not depend on anything but the request.
    fn degraded_template(&self, request: &DispatchRequest) -> String;

    /// Whether `message` contains any crisis keyword as a whole phrase.
    fn is_crisis(&self, message: &str) -> bool {
        let words = tokenize(message);
        self.crisis_keywords()
            .iter()
            .any(|keyword| contains_phrase(&words, &tokenize(keyword)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Minimal safety content for unit tests.
    pub struct FixedSafety {
        pub keywords: Vec<String>,
        pub template: String,
    }

    impl Default for FixedSafety {
        fn default() -> Self {
            Self {
                keywords: vec!["suicide".to_string(), "hurt myself".to_string()],
                template: "We'll be right back.".to_string(),
            }
        }
    }

    impl SafetyContent for FixedSafety {
        fn crisis_keywords(&self) -> &[String] {
            &self.keywords
        }

        fn degraded_template(&self, _request: &DispatchRequest) -> String {
            self.template.clone()
        }
    }
}
