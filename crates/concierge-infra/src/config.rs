//! Configuration loader for Concierge.
//!
//! Reads `config.toml` and deserializes it into [`ConciergeConfig`]. Falls
//! back to defaults when the file is missing or malformed, and replaces
//! individual out-of-range values with their defaults.

use std::path::{Path, PathBuf};

use concierge_types::config::ConciergeConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CONCIERGE_CONFIG";

/// Pick the config file to load.
///
/// Priority:
/// 1. Explicit path (CLI `--config`)
/// 2. `$CONCIERGE_CONFIG`
/// 3. `{config_dir}/concierge/config.toml`
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("concierge").join("config.toml"))
}

/// Load configuration from `path`.
///
/// - Missing file: defaults.
/// - Unreadable or unparseable file: logs a warning and returns defaults.
/// - Otherwise the parsed config, with invalid values reset by [`sanitize`].
pub async fn load_config(path: &Path) -> ConciergeConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return ConciergeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ConciergeConfig::default();
        }
    };

    match toml::from_str::<ConciergeConfig>(&content) {
        Ok(config) => sanitize(config),
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ConciergeConfig::default()
        }
    }
}

/// Replace values that would break routing with their defaults.
pub fn sanitize(mut config: ConciergeConfig) -> ConciergeConfig {
    let defaults = ConciergeConfig::default();

    if !(0.0..=1.0).contains(&config.match_threshold) {
        tracing::warn!(value = config.match_threshold, "match_threshold must be within [0, 1], using default");
        config.match_threshold = defaults.match_threshold;
    }

    if config.budget_ceiling.is_some_and(|c| !(c >= 0.0)) {
        tracing::warn!("budget_ceiling must not be negative, ignoring it");
        config.budget_ceiling = None;
    }
    if config.budget.window_limit.is_some_and(|l| !(l >= 0.0)) {
        tracing::warn!("budget.window_limit must not be negative, ignoring it");
        config.budget.window_limit = None;
    }
    if config.budget.window_seconds == 0 {
        tracing::warn!("budget.window_seconds must be positive, using default");
        config.budget.window_seconds = defaults.budget.window_seconds;
    }

    if config.cache_shards == 0 {
        tracing::warn!("cache_shards must be positive, using default");
        config.cache_shards = defaults.cache_shards;
    }

    let thresholds = &config.complexity_thresholds;
    if thresholds.standard_min_chars == 0 || thresholds.complex_min_chars <= thresholds.standard_min_chars {
        tracing::warn!(
            standard = thresholds.standard_min_chars,
            complex = thresholds.complex_min_chars,
            "complexity thresholds must satisfy 0 < standard < complex, using defaults"
        );
        config.complexity_thresholds.standard_min_chars = defaults.complexity_thresholds.standard_min_chars;
        config.complexity_thresholds.complex_min_chars = defaults.complexity_thresholds.complex_min_chars;
    }

    if config.circuit_breaker.failure_threshold == 0 {
        tracing::warn!("circuit_breaker.failure_threshold must be positive, using default");
        config.circuit_breaker.failure_threshold = defaults.circuit_breaker.failure_threshold;
    }
    if config.timeouts.provider_call_ms == 0 {
        tracing::warn!("timeouts.provider_call_ms must be positive, using default");
        config.timeouts.provider_call_ms = defaults.timeouts.provider_call_ms;
    }
    if !(config.generation.temperature >= 0.0) {
        tracing::warn!("generation.temperature must not be negative, using default");
        config.generation.temperature = defaults.generation.temperature;
    }
    if config.generation.max_tokens == 0 {
        tracing::warn!("generation.max_tokens must be positive, using default");
        config.generation.max_tokens = defaults.generation.max_tokens;
    }

    for provider in &mut config.providers {
        if provider.cost_per_1k_input.is_some_and(|c| !(c >= 0.0)) {
            tracing::warn!(provider = %provider.id, "negative cost_per_1k_input, using pricing table");
            provider.cost_per_1k_input = None;
        }
        if provider.cost_per_1k_output.is_some_and(|c| !(c >= 0.0)) {
            tracing::warn!(provider = %provider.id, "negative cost_per_1k_output, using pricing table");
            provider.cost_per_1k_output = None;
        }
        if !(0.0..=1.0).contains(&provider.quality) {
            tracing::warn!(provider = %provider.id, quality = provider.quality, "quality must be within [0, 1], clamping");
            provider.quality = if provider.quality.is_nan() { 0.5 } else { provider.quality.clamp(0.0, 1.0) };
        }
    }

    config
}
