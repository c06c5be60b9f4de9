//! CapabilityHandler trait and its type-erased wrapper.
//!
//! A capability handler deterministically satisfies one intent without
//! calling a provider. Same three-part shape as the provider abstraction:
//! an RPITIT trait, an object-safe `Dyn` twin with a blanket impl, and a
//! cloneable box the registry stores.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use concierge_types::dispatch::DispatchRequest;
use concierge_types::error::HandlerError;

/// A locally implemented handler for one intent.
pub trait CapabilityHandler: Send + Sync {
    fn handle(
        &self,
        request: &DispatchRequest,
    ) -> impl Future<Output = Result<String, HandlerError>> + Send;
}

/// Object-safe version of [`CapabilityHandler`] with boxed futures.
pub trait CapabilityHandlerDyn: Send + Sync {
    fn handle_boxed<'a>(
        &'a self,
        request: &'a DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, HandlerError>> + Send + 'a>>;
}

impl<T: CapabilityHandler> CapabilityHandlerDyn for T {
    fn handle_boxed<'a>(
        &'a self,
        request: &'a DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, HandlerError>> + Send + 'a>> {
        Box::pin(self.handle(request))
    }
}

/// Type-erased, cheaply cloneable handler.
///
/// Cloning shares the underlying handler, so a registry can be copied into
/// a new snapshot without rebuilding its handlers.
#[derive(Clone)]
pub struct BoxHandler {
    inner: Arc<dyn CapabilityHandlerDyn>,
}

impl BoxHandler {
    pub fn new<T: CapabilityHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    pub async fn handle(&self, request: &DispatchRequest) -> Result<String, HandlerError> {
        self.inner.handle_boxed(request).await
    }
}

impl std::fmt::Debug for BoxHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxHandler")
    }
}

/// Adapts a synchronous closure into a [`CapabilityHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&DispatchRequest) -> Result<String, HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> CapabilityHandler for FnHandler<F>
where
    F: Fn(&DispatchRequest) -> Result<String, HandlerError> + Send + Sync,
{
    async fn handle(&self, request: &DispatchRequest) -> Result<String, HandlerError> {
        (self.0)(request)
    }
}
