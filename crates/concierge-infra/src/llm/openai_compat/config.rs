//! Configuration and well-known endpoints for OpenAI-compatible providers.

use secrecy::SecretString;

/// Configuration for an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Name reported by `LlmProvider::name` (e.g., "openai", "gemini").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
}

/// Base URL for a well-known provider name, if any.
pub fn well_known_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        _ => None,
    }
}

/// Build a config, resolving the base URL from the name when none is given.
///
/// Unknown names without an explicit URL default to the OpenAI endpoint.
pub fn resolve(
    provider_name: &str,
    base_url: Option<&str>,
    api_key: SecretString,
    model: &str,
) -> OpenAiCompatConfig {
    let base_url = base_url
        .or_else(|| well_known_base_url(provider_name))
        .unwrap_or("https://api.openai.com/v1");
    OpenAiCompatConfig {
        provider_name: provider_name.to_string(),
        base_url: base_url.to_string(),
        api_key,
        model: model.to_string(),
    }
}
