//! Middleware run before handler lookup.
//!
//! Each middleware sees the request in registration order and may rewrite it
//! or answer it outright.

use concierge_types::dispatch::DispatchRequest;

/// What a middleware decided about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareOutcome {
    Continue,
    /// Stop here and return this text.
    Respond(String),
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, request: &mut DispatchRequest) -> MiddlewareOutcome;
}

/// Cleans user input before anything scores it.
///
/// Strips control characters, collapses whitespace runs and trims. An
/// empty result is answered directly with a prompt to say more.
#[derive(Debug, Clone)]
pub struct SanitizeInput {
    empty_reply: String,
}

impl SanitizeInput {
    pub fn new(empty_reply: impl Into<String>) -> Self {
        Self {
            empty_reply: empty_reply.into(),
        }
    }
}

impl Default for SanitizeInput {
    fn default() -> Self {
        Self::new("Could you tell me a little more about what you need?")
    }
}

impl Middleware for SanitizeInput {
    fn name(&self) -> &str {
        "sanitize_input"
    }

    fn process(&self, request: &mut DispatchRequest) -> MiddlewareOutcome {
        let cleaned = request
            .message
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if cleaned.is_empty() {
            tracing::debug!(request_id = %request.id, "empty message after sanitizing");
            return MiddlewareOutcome::Respond(self.empty_reply.clone());
        }
        request.message = cleaned;
        MiddlewareOutcome::Continue
    }
}

/// Fills `context.locale` from a default when the caller left it unset.
#[derive(Debug, Clone)]
pub struct LanguageTag {
    default_locale: String,
}

impl LanguageTag {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
        }
    }
}

impl Middleware for LanguageTag {
    fn name(&self) -> &str {
        "language_tag"
    }

    fn process(&self, request: &mut DispatchRequest) -> MiddlewareOutcome {
        if request.context.locale.is_none() {
            request.context.locale = Some(self.default_locale.clone());
        }
        MiddlewareOutcome::Continue
    }
}

/// Adapts a closure into a [`Middleware`].
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut DispatchRequest) -> MiddlewareOutcome + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut DispatchRequest) -> MiddlewareOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, request: &mut DispatchRequest) -> MiddlewareOutcome {
        (self.f)(request)
    }
}
