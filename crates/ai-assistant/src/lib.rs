pub mod assistant;
pub mod openai;
pub mod prompts;

pub use assistant::{OfflineAssistant, TradingAssistant, HISTORY_TURNS};
pub use openai::{OpenAiClient, OpenAiConfig};

use std::time::Duration;

/// Default model when `OPENAI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
