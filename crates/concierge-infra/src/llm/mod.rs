//! Provider adapters and router assembly.
//!
//! Contains concrete implementations of the [`LlmProvider`](concierge_core::llm::provider::LlmProvider)
//! trait defined in `concierge-core`, a factory ([`create_provider`]) that
//! constructs the right adapter from a [`ProviderConfig`], and
//! [`build_router`], which turns a whole [`ConciergeConfig`] into a ready
//! [`ProviderRouter`].

pub mod anthropic;
pub mod openai_compat;
pub mod pricing;

use std::sync::Arc;

use secrecy::SecretString;

use concierge_core::llm::box_provider::BoxLlmProvider;
use concierge_core::llm::router::ProviderRouter;
use concierge_core::safety::SafetyContent;
use concierge_core::service::hash::ContentHasher;
use concierge_types::config::{ConciergeConfig, ProviderConfig, ProviderKind};
use concierge_types::error::ConfigError;
use concierge_types::llm::{CompletionRequest, LlmError, ProviderProfile};

use self::anthropic::AnthropicProvider;
use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] from a [`ProviderConfig`].
pub fn create_provider(config: &ProviderConfig, api_key: SecretString) -> Result<BoxLlmProvider, LlmError> {
    match config.kind {
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key, config.model.clone())?;
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(BoxLlmProvider::new(provider))
        }
        ProviderKind::OpenaiCompatible => {
            let oai_config = openai_compat::config::resolve(
                &config.id,
                config.base_url.as_deref(),
                api_key,
                &config.model,
            );
            Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(oai_config)))
        }
    }
}

/// The routing profile for a configured provider, prices resolved.
pub fn provider_profile(config: &ProviderConfig) -> ProviderProfile {
    let (cost_per_1k_input, cost_per_1k_output) = pricing::resolve_pricing(config);
    ProviderProfile {
        id: config.id.clone(),
        model: config.model.clone(),
        tier: config.tier,
        quality: config.quality,
        cost_per_1k_input,
        cost_per_1k_output,
        avg_latency_ms: config.avg_latency_ms,
        available: true,
    }
}

/// Read the API key for a provider from its configured environment variable.
///
/// Local servers may run without a key: when `api_key_env` is unset the
/// provider gets an empty key.
pub fn resolve_api_key(config: &ProviderConfig) -> Result<SecretString, ConfigError> {
    match &config.api_key_env {
        Some(var) => std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingApiKey(var.clone())),
        None => Ok(SecretString::from(String::new())),
    }
}

/// Build a [`ProviderRouter`] with every enabled, usable provider from `config`.
///
/// Providers whose key is missing or whose profile is invalid are skipped
/// with a warning so one bad entry never blocks startup.
pub fn build_router(
    config: &ConciergeConfig,
    hasher: Arc<dyn ContentHasher>,
    safety: Arc<dyn SafetyContent>,
) -> ProviderRouter {
    let mut router = ProviderRouter::new(config, hasher, safety);

    for provider_config in config.providers.iter().filter(|p| p.enabled) {
        let api_key = match resolve_api_key(provider_config) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(provider = %provider_config.id, error = %e, "skipping provider");
                continue;
            }
        };
        let provider = match create_provider(provider_config, api_key) {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!(provider = %provider_config.id, error = %e, "skipping provider");
                continue;
            }
        };
        if let Err(e) = router.add_boxed_provider(provider_profile(provider_config), provider) {
            tracing::warn!(provider = %provider_config.id, error = %e, "skipping provider");
        }
    }

    if router.providers().is_empty() {
        tracing::warn!("no providers configured, unmatched requests will get the degraded response");
    }
    router
}

/// Send a minimal completion to verify credentials and endpoint.
pub async fn test_provider_connection(provider: &BoxLlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest {
        prompt: "Hello".to_string(),
        system: None,
        max_tokens: 10,
        temperature: 0.0,
    };
    provider.complete(&request).await?;
    Ok(())
}
