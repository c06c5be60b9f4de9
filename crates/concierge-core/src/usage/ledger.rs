//! Append-only usage ledger.
//!
//! Every provider call the router makes (success or failure) lands here.
//! Cache hits never do. Aggregates over a trailing window feed the budget
//! overrun check that can downgrade later classifications.
//!
//! The overrun check runs on every classification, so it keeps a running
//! spend total for the last window asked about. New records add to it and a
//! full rescan happens at most once per refresh interval, which is when
//! records that aged out of the window are dropped from the total.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use concierge_types::usage::{UsageRecord, UsageStats};

/// Default retention: one day of records.
const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// How long a running spend total is trusted before a rescan.
const DEFAULT_SPEND_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct WindowSpend {
    window: Duration,
    since: DateTime<Utc>,
    spent: f64,
    computed_at: Instant,
}

#[derive(Debug)]
pub struct UsageLedger {
    records: RwLock<VecDeque<UsageRecord>>,
    retention: Duration,
    spend: Mutex<Option<WindowSpend>>,
    spend_refresh: Duration,
}

impl UsageLedger {
    /// A ledger that keeps records for at least `retention`.
    pub fn new(retention: Duration) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            retention,
            spend: Mutex::new(None),
            spend_refresh: DEFAULT_SPEND_REFRESH,
        }
    }

    /// Override how often the running spend total is rebuilt from records.
    pub fn with_spend_refresh(mut self, refresh: Duration) -> Self {
        self.spend_refresh = refresh;
        self
    }

    pub fn record(&self, record: UsageRecord) {
        tracing::debug!(
            provider = %record.provider_id,
            tokens_in = record.tokens_in,
            tokens_out = record.tokens_out,
            cost = record.cost,
            success = record.success,
            "usage recorded"
        );
        let cutoff = cutoff(Utc::now(), self.retention);
        let mut records = self.records.write();
        while records.front().is_some_and(|r| r.timestamp < cutoff) {
            records.pop_front();
        }
        if let Some(spend) = self.spend.lock().as_mut() {
            if record.timestamp >= spend.since {
                spend.spent += record.cost;
            }
        }
        records.push_back(record);
    }

    /// Aggregate cost and tokens per provider over the trailing `window`.
    pub fn get_usage_stats(&self, window: Duration) -> UsageStats {
        let now = Utc::now();
        let since = cutoff(now, window);
        let mut stats = UsageStats {
            window_seconds: window.as_secs(),
            since: Some(since),
            ..Default::default()
        };

        let records = self.records.read();
        for record in records.iter().filter(|r| r.timestamp >= since) {
            let entry = stats.providers.entry(record.provider_id.clone()).or_default();
            entry.calls += 1;
            if record.success {
                entry.successes += 1;
            } else {
                entry.failures += 1;
            }
            entry.tokens_in += u64::from(record.tokens_in);
            entry.tokens_out += u64::from(record.tokens_out);
            entry.cost += record.cost;

            stats.total_cost += record.cost;
            stats.total_tokens_in += u64::from(record.tokens_in);
            stats.total_tokens_out += u64::from(record.tokens_out);
        }
        stats
    }

    /// Whether spend over the trailing `window` exceeds `limit` USD.
    pub fn is_overrun(&self, window: Duration, limit: f64) -> bool {
        if let Some(current) = *self.spend.lock() {
            if current.window == window && current.computed_at.elapsed() < self.spend_refresh {
                return current.spent > limit;
            }
        }

        // Lock order is records, then spend, matching `record`.
        let records = self.records.read();
        let since = cutoff(Utc::now(), window);
        let spent = records
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| r.cost)
            .sum::<f64>();
        *self.spend.lock() = Some(WindowSpend {
            window,
            since,
            spent,
            computed_at: Instant::now(),
        });
        spent > limit
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_aggregate_per_provider() {
        let ledger = UsageLedger::default();
        ledger.record(UsageRecord::success("a", 100, 50, 0.01));
        ledger.record(UsageRecord::success("a", 200, 20, 0.02));
        ledger.record(UsageRecord::failure("b"));

        let stats = ledger.get_usage_stats(Duration::from_secs(3600));
        let a = &stats.providers["a"];
        assert_eq!(a.calls, 2);
        assert_eq!(a.tokens_in, 300);
        assert!((a.cost - 0.03).abs() < 1e-9);
        assert_eq!(stats.providers["b"].failures, 1);
        assert!((stats.total_cost - 0.03).abs() < 1e-9);
        assert_eq!(stats.total_tokens_out, 70);
    }

    #[test]
    fn test_window_excludes_old_records() {
        let ledger = UsageLedger::default();
        let mut old = UsageRecord::success("a", 10, 10, 5.0);
        old.timestamp = Utc::now() - chrono::Duration::hours(2);
        ledger.record(old);
        ledger.record(UsageRecord::success("a", 10, 10, 1.0));

        let stats = ledger.get_usage_stats(Duration::from_secs(3600));
        assert_eq!(stats.providers["a"].calls, 1);
        assert!(!ledger.is_overrun(Duration::from_secs(3600), 2.0));
        assert!(ledger.is_overrun(Duration::from_secs(3 * 3600), 2.0));
    }

    #[test]
    fn test_overrun_sees_new_records_before_refresh() {
        let ledger = UsageLedger::default().with_spend_refresh(Duration::from_secs(3600));
        let window = Duration::from_secs(3600);
        ledger.record(UsageRecord::success("a", 10, 10, 0.5));
        assert!(!ledger.is_overrun(window, 1.0));

        ledger.record(UsageRecord::success("a", 10, 10, 0.75));
        assert!(ledger.is_overrun(window, 1.0));
        assert!(!ledger.is_overrun(window, 2.0));
    }

    #[test]
    fn test_overrun_drops_expired_spend_after_refresh() {
        let ledger = UsageLedger::default().with_spend_refresh(Duration::from_millis(20));
        let window = Duration::from_millis(100);
        ledger.record(UsageRecord::success("a", 10, 10, 5.0));
        assert!(ledger.is_overrun(window, 1.0));

        std::thread::sleep(Duration::from_millis(150));
        assert!(!ledger.is_overrun(window, 1.0));
    }

    #[test]
    fn test_overrun_rescans_when_window_changes() {
        let ledger = UsageLedger::default().with_spend_refresh(Duration::from_secs(3600));
        let mut old = UsageRecord::success("a", 10, 10, 5.0);
        old.timestamp = Utc::now() - chrono::Duration::hours(2);
        ledger.record(old);

        assert!(!ledger.is_overrun(Duration::from_secs(3600), 2.0));
        assert!(ledger.is_overrun(Duration::from_secs(3 * 3600), 2.0));
    }

    #[test]
    fn test_retention_prunes_on_record() {
        let ledger = UsageLedger::new(Duration::from_secs(60));
        let mut old = UsageRecord::success("a", 1, 1, 0.0);
        old.timestamp = Utc::now() - chrono::Duration::minutes(5);
        ledger.record(old);
        ledger.record(UsageRecord::success("a", 1, 1, 0.0));
        assert_eq!(ledger.len(), 1);
    }
}
