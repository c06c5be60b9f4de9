//! Cost-aware provider routing.
//!
//! `ProviderRouter` turns a request that no handler claimed into a completion:
//! classify the request's complexity, build a cost/quality-ordered chain of
//! providers, then walk the chain consulting the response cache, the rate
//! limiter and each provider's circuit breaker. If nothing in the chain
//! answers, the safety layer's degraded template is returned. `execute`
//! never fails.

use std::cmp::Ordering;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{Instrument, info_span};

use concierge_types::config::ConciergeConfig;
use concierge_types::dispatch::{DispatchRequest, DispatchResponse, HandledBy, ResponseMetadata};
use concierge_types::error::ConfigError;
use concierge_types::llm::{
    AttemptOutcome, CapabilityTier, CompletionRequest, LlmError, ProviderAttempt, ProviderProfile,
    ProviderStatusInfo, RoutingDecision,
};
use concierge_types::usage::UsageRecord;

use crate::cache::response_cache::{CacheStats, CachedCompletion, Fingerprint, ResponseCache};
use crate::rate_limit::limiter::{RateDecision, RateLimiter};
use crate::safety::SafetyContent;
use crate::service::hash::ContentHasher;
use crate::usage::ledger::UsageLedger;

use super::box_provider::BoxLlmProvider;
use super::complexity::{Classification, ComplexityClassifier};
use super::cost::{calculate_cost, calculate_estimated_cost};
use super::health::{Admission, BreakerSettings, ProviderHealth};
use super::provider::LlmProvider;

/// Routing knobs, usually derived from [`ConciergeConfig`].
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub budget_ceiling: Option<f64>,
    pub cache_ttl: Duration,
    pub provider_call_timeout: Duration,
    pub request_deadline: Option<Duration>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: Option<String>,
    pub budget_window: Duration,
    pub budget_window_limit: Option<f64>,
    pub breaker: BreakerSettings,
}

impl From<&ConciergeConfig> for RouterSettings {
    fn from(config: &ConciergeConfig) -> Self {
        Self {
            budget_ceiling: config.budget_ceiling,
            cache_ttl: Duration::from_secs(config.cache_ttl),
            provider_call_timeout: Duration::from_millis(config.timeouts.provider_call_ms),
            request_deadline: config.timeouts.request_deadline_ms.map(Duration::from_millis),
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            system_prompt: config.generation.system_prompt.clone(),
            budget_window: Duration::from_secs(config.budget.window_seconds),
            budget_window_limit: config.budget.window_limit,
            breaker: BreakerSettings::from(&config.circuit_breaker),
        }
    }
}

struct ProviderSlot {
    profile: ProviderProfile,
    provider: BoxLlmProvider,
    health: Mutex<ProviderHealth>,
}

pub struct ProviderRouter {
    settings: RouterSettings,
    classifier: ComplexityClassifier,
    providers: Vec<ProviderSlot>,
    cache: ResponseCache,
    limiter: RateLimiter,
    ledger: Arc<UsageLedger>,
    hasher: Arc<dyn ContentHasher>,
    safety: Arc<dyn SafetyContent>,
}

/// How the walk over one provider ended.
enum Step {
    Answered(DispatchResponse),
    Next,
    DeadlineHit,
}

impl ProviderRouter {
    pub fn new(
        config: &ConciergeConfig,
        hasher: Arc<dyn ContentHasher>,
        safety: Arc<dyn SafetyContent>,
    ) -> Self {
        Self::with_settings(
            RouterSettings::from(config),
            ComplexityClassifier::new(config.complexity_thresholds.clone()),
            ResponseCache::new(
                config.cache_max_entries,
                config.cache_shards,
                Duration::from_secs(config.cache_ttl),
            ),
            RateLimiter::from_config(&config.rate_limit),
            Arc::new(UsageLedger::default()),
            hasher,
            safety,
        )
    }

    pub fn with_settings(
        settings: RouterSettings,
        classifier: ComplexityClassifier,
        cache: ResponseCache,
        limiter: RateLimiter,
        ledger: Arc<UsageLedger>,
        hasher: Arc<dyn ContentHasher>,
        safety: Arc<dyn SafetyContent>,
    ) -> Self {
        Self {
            settings,
            classifier,
            providers: Vec::new(),
            cache,
            limiter,
            ledger,
            hasher,
            safety,
        }
    }

    /// Register a provider. Must happen before the router starts serving.
    pub fn add_provider<P: LlmProvider + 'static>(
        &mut self,
        profile: ProviderProfile,
        provider: P,
    ) -> Result<(), ConfigError> {
        self.add_boxed_provider(profile, BoxLlmProvider::new(provider))
    }

    pub fn add_boxed_provider(
        &mut self,
        profile: ProviderProfile,
        provider: BoxLlmProvider,
    ) -> Result<(), ConfigError> {
        profile
            .validate()
            .map_err(|reason| ConfigError::InvalidProviderProfile {
                id: profile.id.clone(),
                reason,
            })?;
        if self.providers.iter().any(|s| s.profile.id == profile.id) {
            return Err(ConfigError::DuplicateProvider(profile.id));
        }

        tracing::info!(
            provider = %profile.id,
            model = %profile.model,
            tier = %profile.tier,
            cost_in = profile.cost_per_1k_input,
            cost_out = profile.cost_per_1k_output,
            "provider registered"
        );
        let health = ProviderHealth::new(profile.id.clone(), self.settings.breaker);
        self.providers.push(ProviderSlot {
            profile,
            provider,
            health: Mutex::new(health),
        });
        Ok(())
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Profiles of all configured providers, `available` reflecting breaker state.
    pub fn providers(&self) -> Vec<ProviderProfile> {
        self.providers.iter().map(Self::snapshot).collect()
    }

    /// Health snapshot of every provider, in registration order.
    pub fn health_status(&self) -> Vec<ProviderStatusInfo> {
        self.providers
            .iter()
            .map(|slot| slot.health.lock().to_status_info(&slot.profile))
            .collect()
    }

    /// Pick the capability tier for a request.
    ///
    /// Crisis-relevant requests are always `complex`. When a trailing-window
    /// spend limit is configured and exceeded, other requests drop one tier.
    pub fn classify_complexity(&self, request: &DispatchRequest) -> Classification {
        let overrun = self
            .settings
            .budget_window_limit
            .is_some_and(|limit| self.ledger.is_overrun(self.settings.budget_window, limit));
        let classification = self.classifier.classify(
            &request.message,
            request.context.safety_sensitive,
            self.safety.as_ref(),
            overrun,
        );
        if classification.downgraded {
            tracing::warn!(
                tier = %classification.tier,
                window_secs = self.settings.budget_window.as_secs(),
                "usage over budget window limit, classification downgraded"
            );
        }
        classification
    }

    /// Build the ordered fallback chain for a request.
    ///
    /// Circuit-broken providers are left out. Normal requests rank capable
    /// providers by estimated cost, then quality. If none fits under the
    /// ceiling, the cheapest available provider is returned alone and the
    /// decision is flagged `over_budget`. Safety-sensitive requests ignore
    /// the ceiling and start with the highest-quality `complex` provider.
    pub fn select_provider_chain(
        &self,
        request: &CompletionRequest,
        tier: CapabilityTier,
        budget_ceiling: Option<f64>,
        safety_sensitive: bool,
    ) -> RoutingDecision {
        let mut ranked: Vec<(ProviderProfile, f64)> = self
            .providers
            .iter()
            .map(Self::snapshot)
            .filter(|p| p.available)
            .map(|p| {
                let cost = calculate_estimated_cost(&p, request);
                (p, cost)
            })
            .collect();

        if ranked.is_empty() {
            tracing::warn!(tier = %tier, "no provider available, every circuit is open");
            return RoutingDecision {
                tier,
                chain: Vec::new(),
                estimated_cost: 0.0,
                over_budget: false,
            };
        }

        let (chain, over_budget) = if safety_sensitive {
            ranked.sort_by(|a, b| {
                (b.0.tier >= tier)
                    .cmp(&(a.0.tier >= tier))
                    .then_with(|| by_quality(a, b))
            });
            let over = budget_ceiling.is_some_and(|ceiling| ranked[0].1 > ceiling);
            (ranked, over)
        } else {
            let (mut capable, mut rest): (Vec<_>, Vec<_>) =
                ranked.into_iter().partition(|(p, _)| p.tier >= tier);
            if capable.is_empty() {
                tracing::debug!(tier = %tier, "no provider at requested tier, using best available");
                rest.sort_by(by_quality);
                (rest, false)
            } else {
                capable.sort_by(by_cost);
                match budget_ceiling {
                    Some(ceiling) if capable.iter().all(|(_, cost)| *cost > ceiling) => {
                        let cheapest: Vec<_> = capable
                            .into_iter()
                            .chain(rest)
                            .min_by(by_cost)
                            .into_iter()
                            .collect();
                        (cheapest, true)
                    }
                    Some(ceiling) => {
                        capable.retain(|(_, cost)| *cost <= ceiling);
                        (capable, false)
                    }
                    None => (capable, false),
                }
            }
        };

        let estimated_cost = chain.first().map(|(_, cost)| *cost).unwrap_or(0.0);
        tracing::debug!(
            tier = %tier,
            chain = ?chain.iter().map(|(p, _)| p.id.as_str()).collect::<Vec<_>>(),
            estimated_cost,
            over_budget,
            "provider chain selected"
        );
        RoutingDecision {
            tier,
            chain: chain.into_iter().map(|(p, _)| p).collect(),
            estimated_cost,
            over_budget,
        }
    }

    /// Produce a completion for `request`. Never fails.
    pub async fn execute(&self, request: &DispatchRequest) -> DispatchResponse {
        let started = Instant::now();
        let deadline = self.settings.request_deadline.map(|d| started + d);

        let classification = self.classify_complexity(request);
        let completion = self.completion_request(request);
        let decision = self.select_provider_chain(
            &completion,
            classification.tier,
            self.settings.budget_ceiling,
            classification.safety_sensitive,
        );

        let cacheable = !request.context.personalized && !classification.safety_sensitive;
        let fingerprint =
            cacheable.then(|| Fingerprint::compute(self.hasher.as_ref(), &completion));

        let mut metadata = ResponseMetadata {
            request_id: Some(request.id),
            tier: Some(classification.tier),
            safety_sensitive: classification.safety_sensitive,
            over_budget: decision.over_budget,
            estimated_cost: Some(decision.estimated_cost),
            locale: request.context.locale.clone(),
            ..Default::default()
        };

        if let Some(hit) = fingerprint.as_ref().and_then(|fp| self.cache.get(fp)) {
            return Self::from_cache(hit, metadata, started);
        }

        for (position, profile) in decision.chain.iter().enumerate() {
            if position > 0
                && let Some(hit) = fingerprint.as_ref().and_then(|fp| self.cache.get(fp))
            {
                return Self::from_cache(hit, metadata, started);
            }

            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => {
                        metadata.attempts.push(ProviderAttempt {
                            provider_id: profile.id.clone(),
                            outcome: AttemptOutcome::DeadlineExceeded,
                        });
                        break;
                    }
                },
                None => None,
            };

            let Some(slot) = self.providers.iter().find(|s| s.profile.id == profile.id) else {
                continue;
            };

            match self
                .attempt(
                    slot,
                    request,
                    &completion,
                    fingerprint.as_ref(),
                    remaining,
                    &mut metadata,
                    started,
                )
                .await
            {
                Step::Answered(response) => return response,
                Step::Next => continue,
                Step::DeadlineHit => break,
            }
        }

        self.degraded(request, metadata, started)
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        slot: &ProviderSlot,
        request: &DispatchRequest,
        completion: &CompletionRequest,
        fingerprint: Option<&Fingerprint>,
        remaining: Option<Duration>,
        metadata: &mut ResponseMetadata,
        started: Instant,
    ) -> Step {
        let id = slot.profile.id.as_str();
        let mut record = |outcome: AttemptOutcome| {
            metadata.attempts.push(ProviderAttempt {
                provider_id: id.to_string(),
                outcome,
            });
        };

        let admission = slot.health.lock().try_acquire();
        if admission == Admission::Rejected {
            tracing::debug!(provider = %id, "circuit open, skipping");
            record(AttemptOutcome::CircuitOpen);
            return Step::Next;
        }
        if admission == Admission::Probe {
            tracing::info!(provider = %id, "cooldown elapsed, sending probe request");
        }
        let mut recovery = RecoveryCallGuard {
            health: &slot.health,
            armed: admission == Admission::Probe,
        };

        if let RateDecision::Deny { retry_after } =
            self.limiter.check_limit(&request.context.user_id, id)
        {
            let retry_after_ms = retry_after.as_millis() as u64;
            tracing::warn!(
                provider = %id,
                user = %request.context.user_id,
                retry_after_ms,
                "rate limit denied, failing over"
            );
            slot.health.lock().record_failure(&LlmError::RateLimited {
                retry_after_ms: Some(retry_after_ms),
            });
            recovery.disarm();
            record(AttemptOutcome::RateLimited { retry_after_ms });
            return Step::Next;
        }

        let call_timeout = match remaining {
            Some(left) => left.min(self.settings.provider_call_timeout),
            None => self.settings.provider_call_timeout,
        };
        let cut_by_deadline = remaining.is_some_and(|left| left < self.settings.provider_call_timeout);

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = id,
            gen_ai.request.model = %slot.profile.model,
            gen_ai.request.max_tokens = completion.max_tokens,
            gen_ai.request.temperature = ?completion.temperature,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
        );
        let call_started = Instant::now();
        let call = AssertUnwindSafe(slot.provider.complete(completion)).catch_unwind();
        let result = tokio::time::timeout(call_timeout, call)
            .instrument(span.clone())
            .await
            .map(|outcome| {
                outcome.unwrap_or_else(|_| {
                    tracing::error!(provider = %id, "provider adapter panicked");
                    Err(LlmError::Provider {
                        message: "provider adapter panicked".to_string(),
                    })
                })
            });
        let latency_ms = call_started.elapsed().as_millis() as u64;
        // Every arm below records a verdict or releases the slot itself.
        recovery.disarm();

        match result {
            Ok(Ok(response)) => {
                span.record("gen_ai.usage.input_tokens", response.tokens_in);
                span.record("gen_ai.usage.output_tokens", response.tokens_out);
                slot.health.lock().record_success(latency_ms);
                let cost = calculate_cost(&slot.profile, response.tokens_in, response.tokens_out);
                self.ledger.record(UsageRecord::success(
                    id,
                    response.tokens_in,
                    response.tokens_out,
                    cost,
                ));
                if let Some(fp) = fingerprint {
                    self.cache.put(
                        fp.clone(),
                        CachedCompletion {
                            text: response.text.clone(),
                            provider_id: id.to_string(),
                            tokens_in: response.tokens_in,
                            tokens_out: response.tokens_out,
                        },
                        self.settings.cache_ttl,
                    );
                }
                record(AttemptOutcome::Succeeded);

                metadata.actual_cost = Some(cost);
                metadata.tokens_in = Some(response.tokens_in);
                metadata.tokens_out = Some(response.tokens_out);
                metadata.latency_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(provider = %id, latency_ms, cost, "provider answered");
                Step::Answered(DispatchResponse {
                    handled_by: HandledBy::Provider(id.to_string()),
                    response: response.text,
                    metadata: std::mem::take(metadata),
                })
            }
            Ok(Err(err)) if err.is_transient() => {
                tracing::warn!(provider = %id, error = %err, "transient provider failure, trying next in chain");
                slot.health.lock().record_failure(&err);
                self.ledger.record(UsageRecord::failure(id));
                record(AttemptOutcome::TransientFailure {
                    error: err.to_string(),
                });
                Step::Next
            }
            Ok(Err(err)) => {
                tracing::warn!(provider = %id, error = %err, "permanent provider failure, skipping for this request");
                slot.health.lock().release_probe();
                self.ledger.record(UsageRecord::failure(id));
                record(AttemptOutcome::PermanentFailure {
                    error: err.to_string(),
                });
                Step::Next
            }
            Err(_elapsed) if cut_by_deadline => {
                tracing::warn!(provider = %id, "request deadline reached during provider call");
                slot.health.lock().release_probe();
                record(AttemptOutcome::DeadlineExceeded);
                Step::DeadlineHit
            }
            Err(_elapsed) => {
                let err = LlmError::Timeout {
                    timeout_ms: call_timeout.as_millis() as u64,
                };
                tracing::warn!(provider = %id, error = %err, "provider call timed out, trying next in chain");
                slot.health.lock().record_failure(&err);
                self.ledger.record(UsageRecord::failure(id));
                record(AttemptOutcome::TransientFailure {
                    error: err.to_string(),
                });
                Step::Next
            }
        }
    }

    fn completion_request(&self, request: &DispatchRequest) -> CompletionRequest {
        let locale_hint = request
            .context
            .locale
            .as_deref()
            .map(|locale| format!("Reply in the user's language ({locale})."));
        let system = match (self.settings.system_prompt.clone(), locale_hint) {
            (Some(base), Some(hint)) => Some(format!("{base}\n\n{hint}")),
            (base, hint) => base.or(hint),
        };
        CompletionRequest {
            prompt: request.message.clone(),
            system,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    fn from_cache(
        hit: CachedCompletion,
        mut metadata: ResponseMetadata,
        started: Instant,
    ) -> DispatchResponse {
        metadata.cache_hit = true;
        metadata.actual_cost = Some(0.0);
        metadata.tokens_in = Some(hit.tokens_in);
        metadata.tokens_out = Some(hit.tokens_out);
        metadata.attempts.push(ProviderAttempt {
            provider_id: hit.provider_id.clone(),
            outcome: AttemptOutcome::CacheHit,
        });
        metadata.latency_ms = started.elapsed().as_millis() as u64;
        DispatchResponse {
            handled_by: HandledBy::Provider(hit.provider_id),
            response: hit.text,
            metadata,
        }
    }

    fn degraded(
        &self,
        request: &DispatchRequest,
        mut metadata: ResponseMetadata,
        started: Instant,
    ) -> DispatchResponse {
        tracing::error!(
            request_id = %request.id,
            attempts = metadata.attempts.len(),
            "all providers exhausted, returning degraded response"
        );
        metadata.latency_ms = started.elapsed().as_millis() as u64;
        DispatchResponse {
            handled_by: HandledBy::Degraded,
            response: self.safety.degraded_template(request),
            metadata,
        }
    }

    fn snapshot(slot: &ProviderSlot) -> ProviderProfile {
        let mut profile = slot.profile.clone();
        profile.available = slot.health.lock().is_selectable();
        profile
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.providers.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Hands a half-open circuit's single trial call back if the attempt is
/// dropped before a verdict is recorded, e.g. when the caller cancels
/// `execute` mid-call.
struct RecoveryCallGuard<'a> {
    health: &'a Mutex<ProviderHealth>,
    armed: bool,
}

impl RecoveryCallGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RecoveryCallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.health.lock().release_probe();
        }
    }
}

/// Cheaper first, then higher quality, then id for a stable order.
fn by_cost(a: &(ProviderProfile, f64), b: &(ProviderProfile, f64)) -> Ordering {
    a.1.total_cmp(&b.1)
        .then_with(|| b.0.quality.total_cmp(&a.0.quality))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

/// Higher quality first, then cheaper, then id.
fn by_quality(a: &(ProviderProfile, f64), b: &(ProviderProfile, f64)) -> Ordering {
    b.0.quality
        .total_cmp(&a.0.quality)
        .then_with(|| a.1.total_cmp(&b.1))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use concierge_types::dispatch::DispatchContext;
    use concierge_types::llm::CompletionResponse;

    use crate::safety::test_support::FixedSafety;

    // --- Mock providers ---

    #[derive(Clone)]
    struct ScriptedProvider {
        name: String,
        calls: Arc<AtomicUsize>,
        script: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
        otherwise: Result<String, LlmError>,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn ok(name: &str) -> Self {
            Self {
                name: name.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
                script: Arc::new(Mutex::new(VecDeque::new())),
                otherwise: Ok(format!("answer from {name}")),
                delay: Duration::ZERO,
            }
        }

        fn failing(name: &str, error: LlmError) -> Self {
            Self {
                otherwise: Err(error),
                ..Self::ok(name)
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn then(self, outcome: Result<String, LlmError>) -> Self {
            self.script.lock().push_back(outcome);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.otherwise.clone())
                .map(|text| CompletionResponse {
                    text,
                    tokens_in: 10,
                    tokens_out: 20,
                    latency_ms: 1,
                })
        }
    }

    struct PlainHasher;

    impl ContentHasher for PlainHasher {
        fn compute_hash(&self, content: &str) -> String {
            content.to_string()
        }
    }

    fn profile(id: &str, tier: CapabilityTier, quality: f64, cost: f64) -> ProviderProfile {
        ProviderProfile {
            id: id.to_string(),
            model: format!("{id}-model"),
            tier,
            quality,
            cost_per_1k_input: cost,
            cost_per_1k_output: cost,
            avg_latency_ms: 100,
            available: true,
        }
    }

    fn test_config() -> ConciergeConfig {
        let mut config = ConciergeConfig::default();
        config.rate_limit.requests_per_window = 0;
        config
    }

    fn router_with(config: &ConciergeConfig, tweak: impl FnOnce(&mut RouterSettings)) -> ProviderRouter {
        let mut settings = RouterSettings::from(config);
        tweak(&mut settings);
        ProviderRouter::with_settings(
            settings,
            ComplexityClassifier::new(config.complexity_thresholds.clone()),
            ResponseCache::new(64, 4, Duration::from_secs(config.cache_ttl)),
            RateLimiter::from_config(&config.rate_limit),
            Arc::new(UsageLedger::default()),
            Arc::new(PlainHasher),
            Arc::new(FixedSafety::default()),
        )
    }

    fn router() -> ProviderRouter {
        router_with(&test_config(), |_| {})
    }

    fn request(message: &str) -> DispatchRequest {
        DispatchRequest::new(message, DispatchContext::new("user-1", "conv-1"))
    }

    fn personalized(message: &str) -> DispatchRequest {
        let mut ctx = DispatchContext::new("user-1", "conv-1");
        ctx.personalized = true;
        DispatchRequest::new(message, ctx)
    }

    fn ids(decision: &RoutingDecision) -> Vec<&str> {
        decision.chain.iter().map(|p| p.id.as_str()).collect()
    }

    fn completion(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.to_string(),
            system: None,
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    // --- Chain selection ---

    #[test]
    fn test_chain_orders_capable_providers_by_cost_then_quality() {
        let mut router = router();
        router.add_provider(profile("premium", CapabilityTier::Complex, 0.95, 10.0), ScriptedProvider::ok("premium")).unwrap();
        router.add_provider(profile("budget", CapabilityTier::Basic, 0.4, 0.1), ScriptedProvider::ok("budget")).unwrap();
        router.add_provider(profile("mid-a", CapabilityTier::Standard, 0.6, 1.0), ScriptedProvider::ok("mid-a")).unwrap();
        router.add_provider(profile("mid-b", CapabilityTier::Standard, 0.8, 1.0), ScriptedProvider::ok("mid-b")).unwrap();

        let decision = router.select_provider_chain(&completion("hi"), CapabilityTier::Standard, None, false);
        assert_eq!(ids(&decision), vec!["mid-b", "mid-a", "premium"]);
        assert!(!decision.over_budget);

        let decision = router.select_provider_chain(&completion("hi"), CapabilityTier::Basic, None, false);
        assert_eq!(ids(&decision), vec!["budget", "mid-b", "mid-a", "premium"]);
    }

    #[test]
    fn test_budget_ceiling_filters_and_falls_back_to_cheapest() {
        let mut router = router();
        router.add_provider(profile("premium", CapabilityTier::Complex, 0.95, 10.0), ScriptedProvider::ok("premium")).unwrap();
        router.add_provider(profile("budget", CapabilityTier::Basic, 0.4, 0.1), ScriptedProvider::ok("budget")).unwrap();

        // Complex tier only has "premium"; 100 output tokens at $10/1K is $1.
        let decision = router.select_provider_chain(&completion("hi"), CapabilityTier::Complex, Some(0.05), false);
        assert_eq!(ids(&decision), vec!["budget"]);
        assert!(decision.over_budget);

        let decision = router.select_provider_chain(&completion("hi"), CapabilityTier::Complex, Some(5.0), false);
        assert_eq!(ids(&decision), vec!["premium"]);
        assert!(!decision.over_budget);
    }

    #[test]
    fn test_safety_requests_start_with_highest_quality_complex_provider() {
        let mut router = router();
        router.add_provider(profile("cheap-complex", CapabilityTier::Complex, 0.7, 1.0), ScriptedProvider::ok("cheap-complex")).unwrap();
        router.add_provider(profile("best", CapabilityTier::Complex, 0.99, 20.0), ScriptedProvider::ok("best")).unwrap();
        router.add_provider(profile("budget", CapabilityTier::Basic, 0.4, 0.1), ScriptedProvider::ok("budget")).unwrap();

        let decision = router.select_provider_chain(&completion("help"), CapabilityTier::Complex, Some(0.01), true);
        assert_eq!(ids(&decision), vec!["best", "cheap-complex", "budget"]);
        assert!(decision.over_budget);
    }

    #[tokio::test]
    async fn test_crisis_message_routes_to_highest_quality_despite_ceiling() {
        let mut config = test_config();
        config.budget_ceiling = Some(0.001);
        let mut router = router_with(&config, |_| {});
        let best = ScriptedProvider::ok("best");
        let budget = ScriptedProvider::ok("budget");
        router.add_provider(profile("budget", CapabilityTier::Basic, 0.4, 0.0), budget.clone()).unwrap();
        router.add_provider(profile("best", CapabilityTier::Complex, 0.99, 20.0), best.clone()).unwrap();

        let response = router.execute(&request("I keep thinking about suicide")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("best".to_string()));
        assert_eq!(response.metadata.tier, Some(CapabilityTier::Complex));
        assert!(response.metadata.safety_sensitive);
        assert_eq!(budget.calls(), 0);
    }

    #[test]
    fn test_add_provider_rejects_invalid_and_duplicate_profiles() {
        let mut router = router();
        let err = router
            .add_provider(profile("neg", CapabilityTier::Basic, 0.5, -1.0), ScriptedProvider::ok("neg"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProviderProfile { .. }));

        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("a")).unwrap();
        let err = router
            .add_provider(profile("a", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("a"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProvider(_)));
    }

    // --- Execution ---

    #[tokio::test]
    async fn test_success_writes_usage_record() {
        let mut router = router();
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("a")).unwrap();

        let response = router.execute(&personalized("what's the capital of peru")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("a".to_string()));
        assert_eq!(response.response, "answer from a");
        assert_eq!(response.metadata.tokens_out, Some(20));
        assert!((response.metadata.actual_cost.unwrap() - 0.03).abs() < 1e-9);
        assert_eq!(router.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_query_is_a_cache_hit_without_usage_record() {
        let mut router = router();
        let provider = ScriptedProvider::ok("a");
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 1.0), provider.clone()).unwrap();

        let first = router.execute(&request("what is a token bucket")).await;
        assert!(!first.metadata.cache_hit);
        assert_eq!(router.ledger().len(), 1);

        let second = router.execute(&request("What is a  token bucket")).await;
        assert!(second.metadata.cache_hit);
        assert_eq!(second.response, first.response);
        assert_eq!(second.handled_by, HandledBy::Provider("a".to_string()));
        assert_eq!(router.ledger().len(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_personalized_and_safety_requests_bypass_cache() {
        let mut router = router();
        let provider = ScriptedProvider::ok("a");
        router.add_provider(profile("a", CapabilityTier::Complex, 0.5, 1.0), provider.clone()).unwrap();

        router.execute(&personalized("my balance")).await;
        let again = router.execute(&personalized("my balance")).await;
        assert!(!again.metadata.cache_hit);

        router.execute(&request("thinking about suicide")).await;
        let again = router.execute(&request("thinking about suicide")).await;
        assert!(!again.metadata.cache_hit);

        assert_eq!(provider.calls(), 4);
        assert_eq!(router.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_advances_chain_and_counts_toward_breaker() {
        let mut router = router();
        let a = ScriptedProvider::failing("a", LlmError::Provider { message: "502".into() });
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        assert_eq!(response.metadata.attempts.len(), 2);
        assert!(matches!(
            response.metadata.attempts[0].outcome,
            AttemptOutcome::TransientFailure { .. }
        ));

        let status = router.health_status();
        assert_eq!(status[0].consecutive_failures, 1);
        assert_eq!(router.ledger().get_usage_stats(Duration::from_secs(60)).providers["a"].failures, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_provider_without_touching_breaker() {
        let mut router = router();
        let a = ScriptedProvider::failing("a", LlmError::InvalidRequest("bad".into()));
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        for _ in 0..5 {
            let response = router.execute(&personalized("hello")).await;
            assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        }
        assert_eq!(a.calls(), 5);
        let status = router.health_status();
        assert_eq!(status[0].circuit_state, "closed");
        assert_eq!(status[0].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_breaker_excludes_provider_then_allows_single_probe() {
        let mut router = router_with(&test_config(), |s| {
            s.breaker.failure_threshold = 3;
            s.breaker.cooldown = Duration::from_millis(100);
        });
        let a = ScriptedProvider::failing("a", LlmError::Provider { message: "503".into() });
        let b = ScriptedProvider::ok("b");
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), b.clone()).unwrap();

        for _ in 0..3 {
            router.execute(&personalized("hello")).await;
        }
        assert_eq!(a.calls(), 3);

        // Fourth request: A is excluded from the chain entirely.
        let completion = router.completion_request(&personalized("hello"));
        let decision = router.select_provider_chain(&completion, CapabilityTier::Basic, None, false);
        assert_eq!(ids(&decision), vec!["b"]);
        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        assert_eq!(a.calls(), 3);

        tokio::time::sleep(Duration::from_millis(150)).await;

        // After cooldown: exactly one probe. It fails, so A is excluded again.
        router.execute(&personalized("hello")).await;
        assert_eq!(a.calls(), 4);
        router.execute(&personalized("hello")).await;
        assert_eq!(a.calls(), 4);
        assert_eq!(router.health_status()[0].circuit_state, "open");
    }

    #[tokio::test]
    async fn test_concurrent_requests_after_cooldown_send_one_trial_call() {
        let mut router = router_with(&test_config(), |s| {
            s.breaker.failure_threshold = 1;
            s.breaker.cooldown = Duration::from_millis(50);
        });
        let a = ScriptedProvider::ok("a")
            .then(Err(LlmError::Overloaded("busy".into())))
            .slow(Duration::from_millis(30));
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        router.execute(&personalized("hello")).await;
        assert_eq!(router.health_status()[0].circuit_state, "open");
        tokio::time::sleep(Duration::from_millis(80)).await;

        let (q1, q2) = (personalized("hello"), personalized("hello"));
        let (r1, r2) = tokio::join!(router.execute(&q1), router.execute(&q2));
        assert_eq!(a.calls(), 2);
        let served_by_a = [&r1, &r2]
            .iter()
            .filter(|r| r.handled_by == HandledBy::Provider("a".to_string()))
            .count();
        assert_eq!(served_by_a, 1);
        assert_eq!(router.health_status()[0].circuit_state, "closed");
    }

    #[tokio::test]
    async fn test_cancelled_trial_call_frees_half_open_slot() {
        let mut router = router_with(&test_config(), |s| {
            s.breaker.failure_threshold = 1;
            s.breaker.cooldown = Duration::from_millis(20);
        });
        let a = ScriptedProvider::ok("a")
            .then(Err(LlmError::Overloaded("busy".into())))
            .slow(Duration::from_millis(100));
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        router.execute(&personalized("hello")).await;
        assert_eq!(router.health_status()[0].circuit_state, "open");
        tokio::time::sleep(Duration::from_millis(40)).await;

        // The caller gives up while A is answering the trial call.
        let q = personalized("hello");
        let cancelled = tokio::time::timeout(Duration::from_millis(10), router.execute(&q)).await;
        assert!(cancelled.is_err());
        assert_eq!(a.calls(), 2);

        let response = router.execute(&q).await;
        assert_eq!(response.handled_by, HandledBy::Provider("a".to_string()));
        assert_eq!(a.calls(), 3);
        assert_eq!(router.health_status()[0].circuit_state, "closed");
    }

    struct PanickingProvider;

    impl LlmProvider for PanickingProvider {
        fn name(&self) -> &str {
            "panicky"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            panic!("adapter bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_provider_is_transient_failure() {
        let mut router = router_with(&test_config(), |s| {
            s.breaker.failure_threshold = 1;
            s.breaker.cooldown = Duration::from_millis(20);
        });
        router.add_provider(profile("panicky", CapabilityTier::Basic, 0.5, 0.1), PanickingProvider).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        assert!(matches!(
            response.metadata.attempts[0].outcome,
            AttemptOutcome::TransientFailure { .. }
        ));
        assert_eq!(router.health_status()[0].circuit_state, "open");

        // A panicking trial call reopens the circuit instead of wedging it.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        assert_eq!(response.metadata.attempts.len(), 2);
        assert_eq!(router.health_status()[0].circuit_state, "open");
    }

    #[tokio::test]
    async fn test_rate_limit_denial_fails_over_and_counts_as_failure() {
        let mut config = ConciergeConfig::default();
        config.rate_limit.requests_per_window = 1;
        config.rate_limit.window_seconds = 3600;
        let mut router = router_with(&config, |_| {});
        let a = ScriptedProvider::ok("a");
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), a.clone()).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        let first = router.execute(&personalized("hello")).await;
        assert_eq!(first.handled_by, HandledBy::Provider("a".to_string()));

        let second = router.execute(&personalized("hello")).await;
        assert_eq!(second.handled_by, HandledBy::Provider("b".to_string()));
        assert!(matches!(
            second.metadata.attempts[0].outcome,
            AttemptOutcome::RateLimited { .. }
        ));
        assert_eq!(a.calls(), 1);
        assert_eq!(router.health_status()[0].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_degraded_template() {
        let mut router = router();
        router.add_provider(profile("a", CapabilityTier::Basic, 0.5, 0.1), ScriptedProvider::failing("a", LlmError::Provider { message: "500".into() })).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::failing("b", LlmError::AuthenticationFailed)).unwrap();

        let response = router.execute(&request("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Degraded);
        assert_eq!(response.response, "We'll be right back.");
        assert_eq!(response.metadata.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_no_providers_is_degraded_not_an_error() {
        let router = router();
        let response = router.execute(&request("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Degraded);
        assert!(!response.response.is_empty());
    }

    #[tokio::test]
    async fn test_provider_timeout_is_transient() {
        let mut router = router_with(&test_config(), |s| {
            s.provider_call_timeout = Duration::from_millis(20);
        });
        let slow = ScriptedProvider::ok("slow").slow(Duration::from_millis(200));
        router.add_provider(profile("slow", CapabilityTier::Basic, 0.5, 0.1), slow).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), ScriptedProvider::ok("b")).unwrap();

        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Provider("b".to_string()));
        assert_eq!(router.health_status()[0].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_request_deadline_aborts_to_degraded() {
        let mut router = router_with(&test_config(), |s| {
            s.request_deadline = Some(Duration::from_millis(30));
        });
        let slow = ScriptedProvider::ok("slow").slow(Duration::from_millis(200));
        let b = ScriptedProvider::ok("b");
        router.add_provider(profile("slow", CapabilityTier::Basic, 0.5, 0.1), slow).unwrap();
        router.add_provider(profile("b", CapabilityTier::Basic, 0.5, 1.0), b.clone()).unwrap();

        let response = router.execute(&personalized("hello")).await;
        assert_eq!(response.handled_by, HandledBy::Degraded);
        assert_eq!(
            response.metadata.attempts.last().map(|a| &a.outcome),
            Some(&AttemptOutcome::DeadlineExceeded)
        );
        assert_eq!(b.calls(), 0);
        assert_eq!(router.health_status()[0].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_budget_window_overrun_downgrades_classification() {
        let mut config = test_config();
        config.budget.window_limit = Some(1.0);
        let router = router_with(&config, |_| {});

        let req = request("explain how compound interest works");
        assert_eq!(router.classify_complexity(&req).tier, CapabilityTier::Standard);

        router.ledger().record(UsageRecord::success("a", 1000, 1000, 5.0));
        let classification = router.classify_complexity(&req);
        assert_eq!(classification.tier, CapabilityTier::Basic);
        assert!(classification.downgraded);
    }
}
