//! Capability handlers registered at startup.
//!
//! These answer the cheap, deterministic intents locally so they never cost
//! a provider call.

use concierge_core::handler::capability::FnHandler;
use concierge_core::handler::registry::{HandlerDescriptor, HandlerRegistry};
use concierge_types::dispatch::DispatchRequest;
use concierge_types::error::{HandlerError, RegistryError};
use concierge_types::intent::Intent;

/// A registry holding every built-in handler.
pub fn builtin_registry(match_threshold: f64) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new(match_threshold);
    registry.register(HandlerDescriptor::new(
        "greeting_handler",
        Intent::Greeting,
        ["hello", "hi there", "good morning", "good evening"],
        FnHandler::new(greet),
    ))?;
    registry.register(HandlerDescriptor::new(
        "help_handler",
        Intent::Help,
        ["help", "what can you do"],
        FnHandler::new(help),
    ))?;
    registry.register(
        HandlerDescriptor::new(
            "reminder_handler",
            Intent::CreateReminder,
            ["schedule reminder", "remind me", "set a reminder"],
            FnHandler::new(remind),
        )
        .with_priority(10),
    )?;
    Ok(registry)
}

fn greet(_request: &DispatchRequest) -> Result<String, HandlerError> {
    Ok("Hello! How can I help you today?".to_string())
}

fn help(_request: &DispatchRequest) -> Result<String, HandlerError> {
    Ok("I can set reminders for you, and answer anything else by asking an AI assistant. \
        Try \"remind me to water the plants\"."
        .to_string())
}

fn remind(request: &DispatchRequest) -> Result<String, HandlerError> {
    match reminder_subject(&request.message) {
        Some(subject) => Ok(format!("Okay, I'll remind you to {subject}.")),
        None => Ok("Sure. What should I remind you about?".to_string()),
    }
}

/// The text after the first standalone "to", without trailing punctuation.
fn reminder_subject(message: &str) -> Option<String> {
    let words: Vec<&str> = message.split_whitespace().collect();
    let idx = words.iter().position(|w| w.eq_ignore_ascii_case("to"))?;
    let subject = words[idx + 1..]
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .to_string();
    (!subject.is_empty()).then_some(subject)
}
