use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub check_interval_seconds: u64, // 60
    pub batch_size: usize,           // 50
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            batch_size: 50,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            check_interval_seconds: env::var("ALERT_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            batch_size: env::var("ALERT_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_seconds == 0 {
            bail!("ALERT_CHECK_INTERVAL_SECS must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("ALERT_BATCH_SIZE must be at least 1");
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval(), Duration::from_secs(60));
        // 2000 alerts are processed in 40 batches
        assert_eq!(2000usize.div_ceil(config.batch_size), 40);
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = MonitorConfig {
            check_interval_seconds: 0,
            batch_size: 50,
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            check_interval_seconds: 60,
            batch_size: 0,
        };
        assert!(config.validate().is_err());
    }
}
