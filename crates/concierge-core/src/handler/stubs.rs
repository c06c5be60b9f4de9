//! Audit-time stub generation for intents that have no handler.
//!
//! Only the CLI calls this. Nothing on the dispatch path can reach a stub,
//! so a missing handler always falls through to the provider router rather
//! than serving placeholder text.

use std::collections::HashSet;

use serde::Serialize;

use concierge_types::intent::Intent;

use super::registry::HandlerRegistry;

/// A suggested handler for an uncovered intent.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerStub {
    pub intent: Intent,
    pub suggested_name: String,
    pub patterns: Vec<String>,
    /// Rust source for a registration skeleton.
    pub skeleton: String,
}

/// List catalog intents with no registered handler, with a skeleton for each.
pub fn generate_handler_stubs(registry: &HandlerRegistry, catalog: &[Intent]) -> Vec<HandlerStub> {
    let covered: HashSet<&Intent> = registry.covered_intents().collect();
    catalog
        .iter()
        .filter(|intent| !covered.contains(intent))
        .map(|intent| {
            let suggested_name = format!("{}_handler", intent.as_str());
            let patterns: Vec<String> = intent
                .default_patterns()
                .iter()
                .map(|p| p.to_string())
                .collect();
            let skeleton = render_skeleton(intent, &suggested_name, &patterns);
            HandlerStub {
                intent: intent.clone(),
                suggested_name,
                patterns,
                skeleton,
            }
        })
        .collect()
}

fn render_skeleton(intent: &Intent, name: &str, patterns: &[String]) -> String {
    let quoted: Vec<String> = patterns.iter().map(|p| format!("{p:?}")).collect();
    format!(
        "HandlerDescriptor::new(\n    \"{name}\",\n    Intent::{variant},\n    [{patterns}],\n    FnHandler::new(|request: &DispatchRequest| {{\n        Err(HandlerError::Failed(format!(\"{name} not implemented: {{}}\", request.message)))\n    }}),\n)\n",
        variant = variant_name(intent),
        patterns = quoted.join(", "),
    )
}

/// CamelCase form of a snake_case intent name.
fn variant_name(intent: &Intent) -> String {
    intent
        .as_str()
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::capability::FnHandler;
    use crate::handler::registry::HandlerDescriptor;
    use concierge_types::dispatch::DispatchRequest;

    #[test]
    fn test_stubs_cover_only_missing_intents() {
        let mut registry = HandlerRegistry::new(0.5);
        registry
            .register(HandlerDescriptor::new(
                "greeting_handler",
                Intent::Greeting,
                ["hello"],
                FnHandler::new(|_: &DispatchRequest| Ok("hi".to_string())),
            ))
            .unwrap();

        let stubs = generate_handler_stubs(&registry, &Intent::CATALOG);
        assert_eq!(stubs.len(), Intent::CATALOG.len() - 1);
        assert!(stubs.iter().all(|s| s.intent != Intent::Greeting));

        let reminder = stubs
            .iter()
            .find(|s| s.intent == Intent::CreateReminder)
            .unwrap();
        assert_eq!(reminder.suggested_name, "create_reminder_handler");
        assert!(reminder.skeleton.contains("Intent::CreateReminder"));
        assert!(reminder.skeleton.contains("\"remind me\""));
    }

    #[test]
    fn test_full_coverage_yields_no_stubs() {
        let mut registry = HandlerRegistry::new(0.5);
        for intent in Intent::CATALOG.iter() {
            registry
                .register(HandlerDescriptor::new(
                    intent.as_str(),
                    intent.clone(),
                    intent.default_patterns().iter().copied(),
                    FnHandler::new(|_: &DispatchRequest| Ok(String::new())),
                ))
                .unwrap();
        }
        assert!(generate_handler_stubs(&registry, &Intent::CATALOG).is_empty());
    }
}
