//! The dispatcher: single entry point for every inbound message.
//!
//! Flow per call: middleware in registration order, then
//! `HandlerRegistry::find_handler`, then the matched handler. A handler that
//! errors or panics is treated as no match. Anything unclaimed goes to the
//! fallback handler, normally the [`ProviderRouter`](crate::llm::router::ProviderRouter).
//!
//! Dispatch holds no per-call shared mutable state. The registry lives
//! behind an `Arc` snapshot that `replace_registry` swaps atomically, so a
//! dispatch already in progress keeps the registry it started with.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use parking_lot::RwLock;

use concierge_types::dispatch::{
    ConversationTurn, DispatchContext, DispatchRequest, DispatchResponse, HandledBy,
};
use concierge_types::intent::Intent;

use crate::handler::registry::HandlerRegistry;
use crate::handler::stubs::{HandlerStub, generate_handler_stubs};
use crate::repository::conversation::{ConversationLog, NoopConversationLog};

use super::fallback::FallbackHandler;
use super::middleware::{Middleware, MiddlewareOutcome};

/// Upper bound on a conversation-log write before the response is returned
/// without it.
pub const DEFAULT_LOG_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Dispatcher<L: ConversationLog = NoopConversationLog> {
    registry: RwLock<Arc<HandlerRegistry>>,
    middleware: Vec<Box<dyn Middleware>>,
    fallback: Arc<dyn FallbackHandler>,
    log: L,
    log_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, fallback: Arc<dyn FallbackHandler>) -> Self {
        Self::with_log(registry, fallback, NoopConversationLog)
    }
}

impl<L: ConversationLog> Dispatcher<L> {
    pub fn with_log(registry: HandlerRegistry, fallback: Arc<dyn FallbackHandler>, log: L) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
            middleware: Vec::new(),
            fallback,
            log,
            log_timeout: DEFAULT_LOG_WRITE_TIMEOUT,
        }
    }

    /// Append a middleware. Must happen before traffic starts.
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        tracing::debug!(middleware = %middleware.name(), "middleware added");
        self.middleware.push(Box::new(middleware));
    }

    pub fn set_log_timeout(&mut self, timeout: Duration) {
        self.log_timeout = timeout;
    }

    pub fn set_fallback_handler(&mut self, fallback: Arc<dyn FallbackHandler>) {
        self.fallback = fallback;
    }

    /// The registry snapshot new dispatches will use.
    pub fn registry(&self) -> Arc<HandlerRegistry> {
        self.registry.read().clone()
    }

    /// Swap in a new registry. Safe while dispatches are in flight.
    pub fn replace_registry(&self, registry: HandlerRegistry) {
        let handlers = registry.len();
        *self.registry.write() = Arc::new(registry);
        tracing::info!(handlers, "handler registry replaced");
    }

    /// Audit helper: catalog intents with no registered handler.
    pub fn generate_handler_stubs(&self, catalog: &[Intent]) -> Vec<HandlerStub> {
        generate_handler_stubs(&self.registry(), catalog)
    }

    pub async fn dispatch(
        &self,
        message: impl Into<String>,
        context: DispatchContext,
    ) -> DispatchResponse {
        self.dispatch_request(DispatchRequest::new(message, context))
            .await
    }

    pub async fn dispatch_request(&self, mut request: DispatchRequest) -> DispatchResponse {
        let started = Instant::now();

        let mut response = match self.run_middleware(&mut request) {
            Some(response) => response,
            None => self.route(&request).await,
        };
        response.metadata.request_id = Some(request.id);
        response.metadata.latency_ms = started.elapsed().as_millis() as u64;
        if response.metadata.locale.is_none() {
            response.metadata.locale = request.context.locale.clone();
        }

        let turn = ConversationTurn::from_exchange(&request, &response);
        match tokio::time::timeout(self.log_timeout, self.log.record_turn(&turn)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request.id, error = %e, "failed to record conversation turn");
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %request.id,
                    timeout_ms = self.log_timeout.as_millis() as u64,
                    "conversation log write timed out, turn dropped"
                );
            }
        }

        tracing::debug!(
            request_id = %request.id,
            handled_by = %response.handled_by,
            latency_ms = response.metadata.latency_ms,
            "dispatch complete"
        );
        response
    }

    fn run_middleware(&self, request: &mut DispatchRequest) -> Option<DispatchResponse> {
        for middleware in &self.middleware {
            if let MiddlewareOutcome::Respond(text) = middleware.process(request) {
                tracing::debug!(
                    request_id = %request.id,
                    middleware = %middleware.name(),
                    "middleware short-circuited"
                );
                return Some(DispatchResponse::new(
                    HandledBy::Middleware(middleware.name().to_string()),
                    text,
                ));
            }
        }
        None
    }

    async fn route(&self, request: &DispatchRequest) -> DispatchResponse {
        let registry = self.registry();

        let Some(matched) = registry.find_handler(&request.message) else {
            tracing::debug!(request_id = %request.id, "no handler matched, using fallback");
            return self.fallback.handle(request).await;
        };
        let Some(handler) = registry.handler(&matched.handler).cloned() else {
            return self.fallback.handle(request).await;
        };

        tracing::debug!(
            request_id = %request.id,
            handler = %matched.handler,
            score = matched.score,
            pattern = %matched.matched_pattern,
            "handler matched"
        );

        match AssertUnwindSafe(handler.handle(request)).catch_unwind().await {
            Ok(Ok(text)) => {
                let mut response = DispatchResponse::new(HandledBy::Handler(matched.handler), text);
                response.metadata.match_score = Some(matched.score);
                response.metadata.confidence = Some(matched.confidence);
                response.metadata.safety_sensitive = request.context.safety_sensitive;
                response
            }
            Ok(Err(e)) => {
                tracing::warn!(handler = %matched.handler, error = %e, "handler failed, treating as no match");
                self.fallback.handle(request).await
            }
            Err(_) => {
                tracing::warn!(handler = %matched.handler, "handler panicked, treating as no match");
                self.fallback.handle(request).await
            }
        }
    }
}

impl<L: ConversationLog> std::fmt::Debug for Dispatcher<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.registry.read().len())
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
