//! Request complexity classification.
//!
//! A length-and-cue heuristic picks the capability tier. Crisis-relevant
//! messages are always `complex`, because for those quality dominates cost.

use concierge_types::config::ComplexityThresholds;
use concierge_types::llm::CapabilityTier;

use crate::handler::scoring::{contains_phrase, tokenize};
use crate::safety::SafetyContent;

/// Outcome of classifying one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: CapabilityTier,
    /// Crisis keyword found, or the caller flagged the conversation.
    pub safety_sensitive: bool,
    /// Tier was lowered because the usage ledger reports a budget overrun.
    pub downgraded: bool,
}

#[derive(Debug, Clone)]
pub struct ComplexityClassifier {
    thresholds: ComplexityThresholds,
    cues: Vec<Vec<String>>,
}

impl ComplexityClassifier {
    pub fn new(thresholds: ComplexityThresholds) -> Self {
        let cues = thresholds
            .reasoning_cues
            .iter()
            .map(|cue| tokenize(cue))
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self { thresholds, cues }
    }

    /// Classify a message.
    ///
    /// `flagged` is the caller's own safety flag. `overrun` asks for a
    /// one-tier downgrade, which never applies to safety-sensitive requests.
    pub fn classify(
        &self,
        message: &str,
        flagged: bool,
        safety: &dyn SafetyContent,
        overrun: bool,
    ) -> Classification {
        if flagged || safety.is_crisis(message) {
            return Classification {
                tier: CapabilityTier::Complex,
                safety_sensitive: true,
                downgraded: false,
            };
        }

        let length = message.chars().count();
        let mut tier = if length >= self.thresholds.complex_min_chars {
            CapabilityTier::Complex
        } else if length >= self.thresholds.standard_min_chars {
            CapabilityTier::Standard
        } else {
            CapabilityTier::Basic
        };

        let words = tokenize(message);
        let cue_hits = self
            .cues
            .iter()
            .filter(|cue| contains_phrase(&words, cue))
            .count();
        let cue_tier = match cue_hits {
            0 => CapabilityTier::Basic,
            1 => CapabilityTier::Standard,
            _ => CapabilityTier::Complex,
        };
        tier = tier.max(cue_tier);

        let downgraded = overrun && tier != CapabilityTier::Basic;
        if downgraded {
            tier = tier.downgrade();
        }

        Classification {
            tier,
            safety_sensitive: false,
            downgraded,
        }
    }
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::new(ComplexityThresholds::default())
    }
}
