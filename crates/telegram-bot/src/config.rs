use std::env;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RATE_LIMIT_COMMANDS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub openai_api_key: String,
    pub port: u16,
    pub debug: bool,
    pub deployment_mode: String,
    pub chart_img_api_key: Option<String>,
    pub rate_limit_commands: u32,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_token = required("TELEGRAM_API_TOKEN")?;
        let openai_api_key = required("OPENAI_API_KEY")?;

        let port = match optional("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let rate_limit_commands = match optional("RATE_LIMIT_COMMANDS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "RATE_LIMIT_COMMANDS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_RATE_LIMIT_COMMANDS,
        };

        Ok(Self {
            telegram_token,
            openai_api_key,
            port,
            debug: debug_enabled(),
            deployment_mode: optional("DEPLOYMENT_MODE").unwrap_or_else(|| "development".to_string()),
            chart_img_api_key: optional("CHART_IMG_API_KEY"),
            rate_limit_commands,
        })
    }

    pub fn is_production(&self) -> bool {
        self.deployment_mode.eq_ignore_ascii_case("production")
    }
}

/// Logging settings, resolved before the rest of the configuration so that
/// validation failures are themselves logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub json: bool,
    pub default_filter: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        let json = env::var("RUST_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
            || env::var("DEPLOYMENT_MODE")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false);

        let level = if debug_enabled() { "debug" } else { "info" };
        let default_filter = [
            "tradeai_bot",
            "telegram_bot",
            "market_data",
            "ai_assistant",
            "portfolio_manager",
            "alert_monitor",
            "tower_http",
        ]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");

        Self { json, default_filter }
    }
}

fn debug_enabled() -> bool {
    env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that modify environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "TELEGRAM_API_TOKEN",
        "OPENAI_API_KEY",
        "PORT",
        "DEBUG",
        "DEPLOYMENT_MODE",
        "CHART_IMG_API_KEY",
        "RATE_LIMIT_COMMANDS",
        "RUST_LOG_FORMAT",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_missing_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("OPENAI_API_KEY", "sk-test");

        assert_eq!(
            BotConfig::from_env().unwrap_err(),
            ConfigError::Missing("TELEGRAM_API_TOKEN")
        );
        clear();
    }

    #[test]
    fn test_missing_openai_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TELEGRAM_API_TOKEN", "123:abc");
        env::set_var("OPENAI_API_KEY", "   ");

        assert_eq!(
            BotConfig::from_env().unwrap_err(),
            ConfigError::Missing("OPENAI_API_KEY")
        );
        clear();
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TELEGRAM_API_TOKEN", "123:abc");
        env::set_var("OPENAI_API_KEY", "sk-test");

        let config = BotConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.debug);
        assert!(!config.is_production());
        assert_eq!(config.rate_limit_commands, 10);
        assert!(config.chart_img_api_key.is_none());
        clear();
    }

    #[test]
    fn test_overrides_and_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("TELEGRAM_API_TOKEN", "123:abc");
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("PORT", "10000");
        env::set_var("DEBUG", "TRUE");
        env::set_var("DEPLOYMENT_MODE", "production");
        env::set_var("CHART_IMG_API_KEY", "chart-key");

        let config = BotConfig::from_env().unwrap();
        assert_eq!(config.port, 10000);
        assert!(config.debug);
        assert!(config.is_production());
        assert_eq!(config.chart_img_api_key.as_deref(), Some("chart-key"));

        env::set_var("PORT", "eighty");
        assert!(matches!(
            BotConfig::from_env(),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        clear();
    }

    #[test]
    fn test_log_settings() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();

        let settings = LogSettings::from_env();
        assert!(!settings.json);
        assert!(settings.default_filter.contains("tradeai_bot=info"));

        env::set_var("DEBUG", "true");
        env::set_var("RUST_LOG_FORMAT", "json");
        let settings = LogSettings::from_env();
        assert!(settings.json);
        assert!(settings.default_filter.contains("alert_monitor=debug"));

        env::remove_var("RUST_LOG_FORMAT");
        env::set_var("DEPLOYMENT_MODE", "production");
        assert!(LogSettings::from_env().json);
        clear();
    }
}
