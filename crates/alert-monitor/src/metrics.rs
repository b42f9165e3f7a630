use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single pass over all active alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub alerts_checked: u64,
    pub batches: u64,
    pub triggered: u64,
    pub notify_failures: u64,
    pub quote_failures: u64,
    pub duration_ms: u64,
}

/// Cumulative monitor telemetry, exposed through `/status` and `/metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStats {
    pub cycles_run: u64,
    pub cycles_failed: u64,
    pub alerts_checked: u64,
    pub alerts_triggered: u64,
    pub notify_failures: u64,
    pub quote_failures: u64,
    pub last_cycle_duration_ms: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl MonitorStats {
    pub fn record_cycle(&mut self, report: &CycleReport) {
        self.cycles_run += 1;
        self.alerts_checked += report.alerts_checked;
        self.alerts_triggered += report.triggered;
        self.notify_failures += report.notify_failures;
        self.quote_failures += report.quote_failures;
        self.last_cycle_duration_ms = report.duration_ms;
        self.last_cycle_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self) {
        self.cycles_run += 1;
        self.cycles_failed += 1;
        self.last_cycle_at = Some(Utc::now());
    }

    /// Share of cycles that completed without a storage error (0-100%).
    pub fn success_rate(&self) -> f64 {
        if self.cycles_run == 0 {
            return 100.0;
        }
        (self.cycles_run - self.cycles_failed) as f64 / self.cycles_run as f64 * 100.0
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            cycles_failed = self.cycles_failed,
            alerts_checked = self.alerts_checked,
            alerts_triggered = self.alerts_triggered,
            notify_failures = self.notify_failures,
            quote_failures = self.quote_failures,
            success_rate = format!("{:.1}%", self.success_rate()),
            last_cycle_ms = self.last_cycle_duration_ms,
            "Alert monitor metrics summary"
        );
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "cycles_run": self.cycles_run,
            "cycles_failed": self.cycles_failed,
            "alerts_checked": self.alerts_checked,
            "alerts_triggered": self.alerts_triggered,
            "notify_failures": self.notify_failures,
            "quote_failures": self.quote_failures,
            "success_rate": self.success_rate(),
            "last_cycle_duration_ms": self.last_cycle_duration_ms,
            "last_cycle_at": self.last_cycle_at.map(|t| t.to_rfc3339()),
        })
    }
}
