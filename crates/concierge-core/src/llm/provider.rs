//! LlmProvider trait definition.
//!
//! This is the uniform adapter contract every completion backend implements:
//! `complete(prompt, max_tokens, temperature) -> {text, tokens_in, tokens_out, latency}`.
//! Adding a provider means registering a `ProviderProfile` plus one of these;
//! the router itself does not change.

use concierge_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for completion backends (Anthropic, OpenAI-compatible, local, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). For runtime
/// selection wrap implementations in [`BoxLlmProvider`](super::box_provider::BoxLlmProvider).
///
/// Implementations live in concierge-infra (e.g., `AnthropicProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Model identifier sent to the backend.
    fn model(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
