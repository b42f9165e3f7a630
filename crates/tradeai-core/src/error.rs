use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BotError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The recipient can never be reached (blocked the bot, chat gone).
    #[error("Undeliverable: {0}")]
    Undeliverable(String),
}

impl BotError {
    /// Whether the failure says something about the upstream service's health.
    ///
    /// Unknown symbols and bad input are answered correctly by a healthy
    /// provider and must not count against it.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            BotError::Provider(_) | BotError::RateLimited(_) | BotError::Unavailable(_)
        )
    }
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_failure_classification() {
        assert!(BotError::Provider("timeout".into()).is_upstream_failure());
        assert!(BotError::RateLimited("note".into()).is_upstream_failure());
        assert!(!BotError::NotFound("ZZZZ".into()).is_upstream_failure());
        assert!(!BotError::InvalidSymbol("??".into()).is_upstream_failure());
        assert!(!BotError::Undeliverable("blocked".into()).is_upstream_failure());
    }

    #[test]
    fn test_display() {
        let err = BotError::InvalidSymbol("$$$".into());
        assert_eq!(err.to_string(), "Invalid symbol: $$$");
    }
}
