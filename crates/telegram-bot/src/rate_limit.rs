use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window command limiter keyed by Telegram user id.
pub struct RateLimiter {
    limits: RwLock<HashMap<i64, (Instant, u32)>>,
    max_commands: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_commands: u32) -> Self {
        Self::with_window(max_commands, RATE_LIMIT_WINDOW)
    }

    pub fn with_window(max_commands: u32, window: Duration) -> Self {
        Self {
            limits: RwLock::new(HashMap::new()),
            max_commands,
            window,
        }
    }

    /// `Err(wait_secs)` when the user has exhausted the current window.
    pub async fn check(&self, user_id: i64) -> Result<(), u64> {
        self.check_at(user_id, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, user_id: i64, now: Instant) -> Result<(), u64> {
        let mut limits = self.limits.write().await;

        if limits.len() > 1000 {
            let window = self.window;
            limits.retain(|_, (ts, _)| now.duration_since(*ts) < window);
        }

        if let Some((window_start, count)) = limits.get_mut(&user_id) {
            let elapsed = now.duration_since(*window_start);
            if elapsed >= self.window {
                *window_start = now;
                *count = 1;
                Ok(())
            } else if *count >= self.max_commands {
                Err((self.window - elapsed).as_secs().max(1))
            } else {
                *count += 1;
                Ok(())
            }
        } else {
            limits.insert(user_id, (now, 1));
            Ok(())
        }
    }
}
