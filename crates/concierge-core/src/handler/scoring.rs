//! Pure intent-pattern scoring.
//!
//! A pattern is a short phrase ("schedule reminder"). A message scores 1.0
//! against a pattern when it contains the whole phrase contiguously, and
//! `PARTIAL_WEIGHT * matched / pattern_len` when it only shares some of the
//! pattern's keywords. Dividing by pattern length keeps long patterns from
//! winning just because they have more words to overlap with.

use std::collections::HashSet;

/// Weight applied to keyword overlap that is not an exact phrase match.
pub const PARTIAL_WEIGHT: f64 = 0.8;

/// Lowercase alphanumeric words of `text`, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Whether `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// A registered pattern, pre-tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentPattern {
    raw: String,
    tokens: Vec<String>,
}

impl IntentPattern {
    /// Returns `None` for malformed patterns (nothing left after tokenizing).
    pub fn parse(raw: &str) -> Option<Self> {
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// A message tokenized once and scored against many patterns.
#[derive(Debug, Clone)]
pub struct MessageTokens {
    sequence: Vec<String>,
    words: HashSet<String>,
}

impl MessageTokens {
    pub fn new(message: &str) -> Self {
        let sequence = tokenize(message);
        let words = sequence.iter().cloned().collect();
        Self { sequence, words }
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }
}

/// Score one pattern against a message. Always within `[0, 1]`.
pub fn score_pattern(message: &MessageTokens, pattern: &IntentPattern) -> f64 {
    if message.is_empty() {
        return 0.0;
    }
    if contains_phrase(&message.sequence, &pattern.tokens) {
        return 1.0;
    }

    let unique: HashSet<&String> = pattern.tokens.iter().collect();
    let matched = unique.iter().filter(|t| message.words.contains(**t)).count();
    let score = PARTIAL_WEIGHT * matched as f64 / unique.len() as f64;
    score.clamp(0.0, 1.0)
}

/// Best pattern for a message: `(index into patterns, score)`.
///
/// Ties keep the earliest pattern.
pub fn best_pattern(message: &MessageTokens, patterns: &[IntentPattern]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, pattern) in patterns.iter().enumerate() {
        let score = score_pattern(message, pattern);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(message: &str, pattern: &str) -> f64 {
        let pattern = IntentPattern::parse(pattern).unwrap();
        score_pattern(&MessageTokens::new(message), &pattern)
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        assert_eq!(tokenize("Remind me, please!"), vec!["remind", "me", "please"]);
        assert!(tokenize("  ?!  ").is_empty());
    }

    #[test]
    fn test_exact_phrase_scores_highest() {
        assert_eq!(score("please set a reminder now", "set a reminder"), 1.0);
    }

    #[test]
    fn test_partial_overlap_is_weighted_and_normalized() {
        let s = score("schedule a reminder for my appointment", "schedule reminder");
        assert!((s - 0.8).abs() < 1e-9);

        let half = score("schedule the meeting", "schedule reminder");
        assert!((half - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_verbose_patterns_not_favored() {
        // Same two-word overlap: the longer pattern gets a lower score.
        let short = score("book dentist", "book dentist");
        let long = score("book dentist", "book a dentist visit for next week");
        assert!(short > long);
    }

    #[test]
    fn test_malformed_patterns_rejected() {
        assert!(IntentPattern::parse("").is_none());
        assert!(IntentPattern::parse(" -- ").is_none());
        assert!(IntentPattern::parse("ok").is_some());
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let messages = ["", "hi", "hi hi hi hi", "schedule reminder schedule reminder"];
        let patterns = ["hi", "schedule reminder", "a b c d e f"];
        for m in messages {
            for p in patterns {
                let s = score(m, p);
                assert!((0.0..=1.0).contains(&s), "{m:?} vs {p:?} -> {s}");
            }
        }
    }

    #[test]
    fn test_best_pattern_prefers_earliest_on_tie() {
        let patterns = vec![
            IntentPattern::parse("remind me").unwrap(),
            IntentPattern::parse("me remind").unwrap(),
        ];
        let message = MessageTokens::new("remind everyone about me");
        let (idx, s) = best_pattern(&message, &patterns).unwrap();
        assert_eq!(idx, 0);
        assert!((s - 0.8).abs() < 1e-9);
    }
}
