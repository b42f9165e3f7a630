//! Background price-alert monitoring.
//!
//! Active alerts are paged out of storage in batches, quoted once per unique
//! symbol, evaluated against their condition and delivered through an
//! [`AlertNotifier`](tradeai_core::AlertNotifier).

pub mod config;
pub mod metrics;
pub mod monitor;

pub use config::MonitorConfig;
pub use metrics::{CycleReport, MonitorStats};
pub use monitor::{format_alert_message, AlertMonitor};
