use alert_monitor::MonitorStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Process-wide liveness state shared by the bot handler and the health server.
pub struct BotStatus {
    started_at: Instant,
    ready: AtomicBool,
    monitor: Option<Arc<RwLock<MonitorStats>>>,
}

impl BotStatus {
    pub fn new(monitor: Option<Arc<RwLock<MonitorStats>>>) -> Self {
        Self {
            started_at: Instant::now(),
            ready: AtomicBool::new(false),
            monitor,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Flip to ready once the bot is polling for updates.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub async fn monitor_stats(&self) -> Option<MonitorStats> {
        match &self.monitor {
            Some(stats) => Some(stats.read().await.clone()),
            None => None,
        }
    }
}

/// `Hh Mm Ss`, as shown by `/status`.
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0h 0m 0s");
        assert_eq!(format_uptime(3725), "1h 2m 5s");
        assert_eq!(format_uptime(90_061), "25h 1m 1s");
    }

    #[tokio::test]
    async fn test_readiness_and_monitor() {
        let status = BotStatus::new(None);
        assert!(!status.is_ready());
        status.set_ready();
        assert!(status.is_ready());
        assert!(status.monitor_stats().await.is_none());

        let stats = Arc::new(RwLock::new(MonitorStats::default()));
        stats.write().await.record_failure();
        let status = BotStatus::new(Some(stats));
        assert_eq!(status.monitor_stats().await.unwrap().cycles_failed, 1);
    }
}
