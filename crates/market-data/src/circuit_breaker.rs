use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_THRESHOLD: u32 = 5;
const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// Per-provider circuit breaker. After `threshold` consecutive failures the
/// provider is skipped for `cooldown_secs` seconds to let it recover.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown_secs: u64,
    consecutive_failures: AtomicU32,
    open_until_epoch_secs: AtomicU64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limits(name, DEFAULT_THRESHOLD, DEFAULT_COOLDOWN_SECS)
    }

    pub fn with_limits(name: impl Into<String>, threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            cooldown_secs,
            consecutive_failures: AtomicU32::new(0),
            open_until_epoch_secs: AtomicU64::new(0),
        }
    }

    /// Returns true if the circuit is open (calls should be skipped).
    pub fn is_open(&self) -> bool {
        self.is_open_at(now_secs())
    }

    fn is_open_at(&self, now: u64) -> bool {
        let until = self.open_until_epoch_secs.load(Ordering::Relaxed);
        if until == 0 {
            return false;
        }
        if now >= until {
            // Cooldown expired: half-open, let the next call through
            self.open_until_epoch_secs.store(0, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.open_until_epoch_secs.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.record_failure_at(now_secs());
    }

    fn record_failure_at(&self, now: u64) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.threshold {
            self.open_until_epoch_secs
                .store(now + self.cooldown_secs, Ordering::Relaxed);
            tracing::warn!(
                provider = %self.name,
                "Circuit breaker OPEN: {} consecutive failures, skipping for {}s",
                count,
                self.cooldown_secs
            );
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let cb = CircuitBreaker::with_limits("test", 3, 30);
        cb.record_failure_at(1_000);
        cb.record_failure_at(1_000);
        assert!(!cb.is_open_at(1_000));
        cb.record_failure_at(1_000);
        assert!(cb.is_open_at(1_010));
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let cb = CircuitBreaker::with_limits("test", 1, 30);
        cb.record_failure_at(1_000);
        assert!(cb.is_open_at(1_029));
        assert!(!cb.is_open_at(1_030));
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_success_resets() {
        let cb = CircuitBreaker::with_limits("test", 2, 30);
        cb.record_failure_at(1_000);
        cb.record_success();
        cb.record_failure_at(1_000);
        assert!(!cb.is_open_at(1_000));
    }
}
