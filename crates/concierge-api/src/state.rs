//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The core is generic over its collaborators; AppState pins them to the
//! concrete infra implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use concierge_core::dispatch::dispatcher::Dispatcher;
use concierge_core::dispatch::middleware::{LanguageTag, SanitizeInput};
use concierge_core::llm::router::ProviderRouter;
use concierge_infra::config::{load_config, resolve_config_path};
use concierge_infra::crypto::hash::Sha256ContentHasher;
use concierge_infra::llm::build_router;
use concierge_infra::safety::StaticSafetyContent;
use concierge_types::config::ConciergeConfig;

use crate::builtin::builtin_registry;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConciergeConfig>,
    pub router: Arc<ProviderRouter>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Load configuration and wire the dispatcher and provider router.
    pub async fn init(explicit_config: Option<&Path>) -> anyhow::Result<Self> {
        let config = match resolve_config_path(explicit_config) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                load_config(&path).await
            }
            None => ConciergeConfig::default(),
        };
        Self::from_config(config)
    }

    /// Wire services from an already loaded configuration.
    pub fn from_config(config: ConciergeConfig) -> anyhow::Result<Self> {
        let safety = Arc::new(StaticSafetyContent::from_config(&config.safety));
        let router = Arc::new(build_router(
            &config,
            Arc::new(Sha256ContentHasher),
            safety,
        ));

        let registry = builtin_registry(config.match_threshold)
            .context("failed to register built-in handlers")?;

        let mut dispatcher = Dispatcher::new(registry, router.clone());
        dispatcher.add_middleware(SanitizeInput::default());
        if let Some(locale) = &config.default_locale {
            dispatcher.add_middleware(LanguageTag::new(locale.clone()));
        }

        Ok(Self {
            config: Arc::new(config),
            router,
            dispatcher: Arc::new(dispatcher),
        })
    }
}
