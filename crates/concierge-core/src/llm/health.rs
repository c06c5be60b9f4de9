//! Provider health tracking for the fallback chain.
//!
//! Implements a circuit breaker per provider. Each `ProviderHealth` sits
//! behind its own lock inside the router so one provider's bookkeeping never
//! serializes routing for the others.

use std::time::{Duration, Instant};

use concierge_types::config::CircuitBreakerConfig;
use concierge_types::llm::{LlmError, ProviderProfile, ProviderStatusInfo};

/// Trip and recovery parameters.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Consecutive failures (inside `window`) that open the circuit.
    pub failure_threshold: u32,
    /// A failure streak older than this starts over.
    pub window: Duration,
    /// How long an open circuit stays open before a probe is allowed.
    pub cooldown: Duration,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            window: Duration::from_secs(config.window_seconds),
            cooldown: Duration::from_secs(config.cooldown_seconds),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

/// Circuit breaker state for a provider.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward threshold.
    Closed {
        consecutive_failures: u32,
        first_failure_at: Option<Instant>,
    },
    /// Provider is excluded until `cooldown` elapses.
    Open {
        opened_at: Instant,
        cooldown: Duration,
    },
    /// Cooldown elapsed. Exactly one probe request decides what happens next.
    HalfOpen { probe_in_flight: bool },
}

/// Result of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// This call is the single recovery probe.
    Probe,
    Rejected,
}

/// Health tracking for a single provider.
#[derive(Debug)]
pub struct ProviderHealth {
    pub name: String,
    pub state: CircuitState,
    pub last_error: Option<String>,
    pub last_success: Option<Instant>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
    settings: BreakerSettings,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed {
                consecutive_failures: 0,
                first_failure_at: None,
            },
            last_error: None,
            last_success: None,
            last_latency_ms: None,
            total_calls: 0,
            total_failures: 0,
            settings,
        }
    }

    /// Whether chain selection should include this provider.
    ///
    /// An open circuit whose cooldown has elapsed is selectable so that the
    /// next request can carry the probe. A half-open circuit with a probe
    /// already in flight is not.
    pub fn is_selectable(&self) -> bool {
        match &self.state {
            CircuitState::Closed { .. } => true,
            CircuitState::Open {
                opened_at,
                cooldown,
            } => opened_at.elapsed() >= *cooldown,
            CircuitState::HalfOpen { probe_in_flight } => !probe_in_flight,
        }
    }

    /// Claim the right to call this provider now.
    ///
    /// Transitions Open -> HalfOpen once the cooldown has elapsed and hands
    /// the single probe slot to the caller.
    pub fn try_acquire(&mut self) -> Admission {
        match &self.state {
            CircuitState::Closed { .. } => Admission::Admitted,
            CircuitState::Open {
                opened_at,
                cooldown,
            } => {
                if opened_at.elapsed() >= *cooldown {
                    self.state = CircuitState::HalfOpen {
                        probe_in_flight: true,
                    };
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen { probe_in_flight } => {
                if *probe_in_flight {
                    Admission::Rejected
                } else {
                    self.state = CircuitState::HalfOpen {
                        probe_in_flight: true,
                    };
                    Admission::Probe
                }
            }
        }
    }

    /// Give the probe slot back without a verdict (permanent error, deadline).
    pub fn release_probe(&mut self) {
        if let CircuitState::HalfOpen { probe_in_flight } = &mut self.state {
            *probe_in_flight = false;
        }
    }

    /// Record a successful call to this provider.
    pub fn record_success(&mut self, latency_ms: u64) {
        self.total_calls += 1;
        self.last_success = Some(Instant::now());
        self.last_latency_ms = Some(latency_ms);

        if matches!(self.state, CircuitState::HalfOpen { .. }) {
            tracing::info!(provider = %self.name, "probe succeeded, circuit closed");
        }
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
            first_failure_at: None,
        };
    }

    /// Record a transient failure. Permanent failures never reach this.
    pub fn record_failure(&mut self, error: &LlmError) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());

        let now = Instant::now();
        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
                first_failure_at,
            } => {
                let (count, started) = match first_failure_at {
                    Some(start) if now.duration_since(*start) <= self.settings.window => {
                        (consecutive_failures + 1, *start)
                    }
                    _ => (1, now),
                };
                if count >= self.settings.failure_threshold {
                    tracing::warn!(
                        provider = %self.name,
                        failures = count,
                        cooldown_secs = self.settings.cooldown.as_secs_f64(),
                        "circuit opened"
                    );
                    self.open(now);
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: count,
                        first_failure_at: Some(started),
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                tracing::warn!(provider = %self.name, "probe failed, circuit reopened");
                self.open(now);
            }
            CircuitState::Open { .. } => {}
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open {
            opened_at: now,
            cooldown: self.settings.cooldown,
        };
    }

    pub fn state_name(&self) -> &'static str {
        match &self.state {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        }
    }

    /// Convert to a `ProviderStatusInfo` for CLI and REST display.
    pub fn to_status_info(&self, profile: &ProviderProfile) -> ProviderStatusInfo {
        let consecutive_failures = match &self.state {
            CircuitState::Closed {
                consecutive_failures,
                ..
            } => *consecutive_failures,
            CircuitState::Open { .. } | CircuitState::HalfOpen { .. } => {
                self.settings.failure_threshold
            }
        };

        let last_success_ago = self.last_success.map(|s| {
            let elapsed = s.elapsed();
            if elapsed.as_secs() < 60 {
                format!("{}s ago", elapsed.as_secs())
            } else if elapsed.as_secs() < 3600 {
                format!("{}m ago", elapsed.as_secs() / 60)
            } else {
                format!("{}h ago", elapsed.as_secs() / 3600)
            }
        });

        ProviderStatusInfo {
            id: profile.id.clone(),
            model: profile.model.clone(),
            tier: profile.tier,
            circuit_state: self.state_name().to_string(),
            consecutive_failures,
            last_error: self.last_error.clone(),
            last_success_ago,
            last_latency_ms: self.last_latency_ms,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::llm::CapabilityTier;

    fn settings(threshold: u32, window_ms: u64, cooldown_ms: u64) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: threshold,
            window: Duration::from_millis(window_ms),
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    fn transient() -> LlmError {
        LlmError::Provider {
            message: "502".to_string(),
        }
    }

    #[test]
    fn test_new_provider_is_closed_and_selectable() {
        let health = ProviderHealth::new("anthropic", BreakerSettings::default());
        assert_eq!(health.state_name(), "closed");
        assert!(health.is_selectable());
    }

    #[test]
    fn test_circuit_opens_after_threshold_failures() {
        let mut health = ProviderHealth::new("test", settings(3, 60_000, 60_000));
        health.record_failure(&transient());
        health.record_failure(&transient());
        assert!(health.is_selectable());

        health.record_failure(&transient());
        assert!(!health.is_selectable());
        assert_eq!(health.try_acquire(), Admission::Rejected);
        assert!(matches!(health.state, CircuitState::Open { .. }));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut health = ProviderHealth::new("test", settings(3, 60_000, 60_000));
        health.record_failure(&transient());
        health.record_failure(&transient());
        health.record_success(120);
        health.record_failure(&transient());
        assert!(matches!(
            health.state,
            CircuitState::Closed {
                consecutive_failures: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_failures_outside_window_start_a_new_streak() {
        let mut health = ProviderHealth::new("test", settings(2, 20, 60_000));
        health.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(40));
        health.record_failure(&transient());
        assert!(health.is_selectable());
        assert!(matches!(
            health.state,
            CircuitState::Closed {
                consecutive_failures: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_single_probe_after_cooldown() {
        let mut health = ProviderHealth::new("test", settings(1, 60_000, 20));
        health.record_failure(&transient());
        assert!(!health.is_selectable());

        std::thread::sleep(Duration::from_millis(40));
        assert!(health.is_selectable());
        assert_eq!(health.try_acquire(), Admission::Probe);
        // A concurrent request does not get a second probe.
        assert!(!health.is_selectable());
        assert_eq!(health.try_acquire(), Admission::Rejected);

        health.record_success(80);
        assert_eq!(health.state_name(), "closed");
        assert_eq!(health.try_acquire(), Admission::Admitted);
    }

    #[test]
    fn test_failed_probe_restarts_cooldown() {
        let mut health = ProviderHealth::new("test", settings(1, 60_000, 20));
        health.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(health.try_acquire(), Admission::Probe);

        health.record_failure(&transient());
        assert_eq!(health.state_name(), "open");
        assert!(!health.is_selectable());
    }

    #[test]
    fn test_released_probe_can_be_retaken() {
        let mut health = ProviderHealth::new("test", settings(1, 60_000, 0));
        health.record_failure(&transient());
        assert_eq!(health.try_acquire(), Admission::Probe);
        health.release_probe();
        assert!(health.is_selectable());
        assert_eq!(health.try_acquire(), Admission::Probe);
    }

    #[test]
    fn test_to_status_info() {
        let mut health = ProviderHealth::new("anthropic", BreakerSettings::default());
        health.record_success(250);
        let profile = ProviderProfile {
            id: "anthropic".to_string(),
            model: "claude".to_string(),
            tier: CapabilityTier::Complex,
            quality: 0.9,
            cost_per_1k_input: 0.003,
            cost_per_1k_output: 0.015,
            avg_latency_ms: 900,
            available: true,
        };
        let info = health.to_status_info(&profile);
        assert_eq!(info.id, "anthropic");
        assert_eq!(info.circuit_state, "closed");
        assert_eq!(info.total_calls, 1);
        assert_eq!(info.last_latency_ms, Some(250));
        assert_eq!(info.last_success_ago.as_deref(), Some("0s ago"));
    }
}
