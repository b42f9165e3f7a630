//! Telegram front end: command parsing, reply formatting, charts, the health
//! server and the alert notifier. `main.rs` wires these to teloxide.

pub mod charts;
pub mod commands;
pub mod config;
pub mod handler;
pub mod health;
pub mod messages;
pub mod notifier;
pub mod rate_limit;
pub mod status;

pub use charts::ChartService;
pub use config::{BotConfig, ConfigError, LogSettings};
pub use handler::{Handler, HandlerError, Reply};
pub use notifier::TelegramNotifier;
pub use rate_limit::RateLimiter;
pub use status::BotStatus;
