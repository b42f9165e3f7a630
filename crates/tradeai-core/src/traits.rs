use async_trait::async_trait;

use crate::{Bar, BotError, ChartPeriod, StockQuote};

/// Source of live quotes and price history.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError>;

    /// Daily bars covering `period`, oldest first.
    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let _ = period;
        Err(BotError::Unsupported(format!(
            "{} does not serve history for {}",
            self.name(),
            symbol
        )))
    }
}

/// A chat message passed to a language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat-completion backend.
#[async_trait]
pub trait Assistant: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, BotError>;
}

/// Delivers triggered alert messages to a user.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, user_id: i64, message: &str) -> Result<(), BotError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct QuoteOnly;

    #[async_trait]
    impl QuoteProvider for QuoteOnly {
        fn name(&self) -> &str {
            "quote-only"
        }

        async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
            Ok(StockQuote::from_prices(symbol, 10.0, 10.0, self.name()))
        }
    }

    #[tokio::test]
    async fn test_history_defaults_to_unsupported() {
        let provider = QuoteOnly;
        let err = provider.history("AAPL", ChartPeriod::OneMonth).await.unwrap_err();
        assert!(matches!(err, BotError::Unsupported(_)));
        assert!(provider.quote("AAPL").await.is_ok());
    }
}
