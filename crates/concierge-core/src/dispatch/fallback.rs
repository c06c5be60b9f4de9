//! What the dispatcher calls when no handler answers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use concierge_types::dispatch::{DispatchRequest, DispatchResponse, HandledBy};

use crate::llm::router::ProviderRouter;
use crate::safety::SafetyContent;

pub type FallbackFuture<'a> = Pin<Box<dyn Future<Output = DispatchResponse> + Send + 'a>>;

/// Produces a response for requests no handler claimed. Must not fail.
///
/// Object-safe so the dispatcher can hold any implementation behind an `Arc`.
pub trait FallbackHandler: Send + Sync {
    fn handle<'a>(&'a self, request: &'a DispatchRequest) -> FallbackFuture<'a>;
}

impl FallbackHandler for ProviderRouter {
    fn handle<'a>(&'a self, request: &'a DispatchRequest) -> FallbackFuture<'a> {
        Box::pin(self.execute(request))
    }
}

impl<T: FallbackHandler + ?Sized> FallbackHandler for Arc<T> {
    fn handle<'a>(&'a self, request: &'a DispatchRequest) -> FallbackFuture<'a> {
        (**self).handle(request)
    }
}

/// Answers every request with the safety layer's degraded template.
///
/// Used when no provider is configured at all.
pub struct DegradedFallback {
    safety: Arc<dyn SafetyContent>,
}

impl DegradedFallback {
    pub fn new(safety: Arc<dyn SafetyContent>) -> Self {
        Self { safety }
    }
}

impl FallbackHandler for DegradedFallback {
    fn handle<'a>(&'a self, request: &'a DispatchRequest) -> FallbackFuture<'a> {
        Box::pin(async move {
            tracing::warn!(request_id = %request.id, "no fallback provider configured, answering degraded");
            let mut response =
                DispatchResponse::new(HandledBy::Degraded, self.safety.degraded_template(request));
            response.metadata.request_id = Some(request.id);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::test_support::FixedSafety;
    use concierge_types::dispatch::DispatchContext;

    #[tokio::test]
    async fn test_degraded_fallback_uses_template() {
        let fallback = DegradedFallback::new(Arc::new(FixedSafety::default()));
        let request = DispatchRequest::new("anything", DispatchContext::new("u", "c"));
        let response = fallback.handle(&request).await;
        assert_eq!(response.handled_by, HandledBy::Degraded);
        assert_eq!(response.response, "We'll be right back.");
        assert_eq!(response.metadata.request_id, Some(request.id));
    }
}
