pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;

/// Service name reported by the health endpoint and `/status`.
pub const SERVICE_NAME: &str = "TradeAI Telegram Bot";

/// Version reported to users and to the hosting platform.
pub const SERVICE_VERSION: &str = "1.0.0";
