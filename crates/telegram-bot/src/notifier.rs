use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tradeai_core::{AlertNotifier, BotError};

/// Delivers triggered alerts to the user's private chat, whose id equals the user id.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl AlertNotifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, message: &str) -> Result<(), BotError> {
        self.bot
            .send_message(ChatId(user_id), message)
            .await
            .map(|_| ())
            .map_err(|e| delivery_error(user_id, e))
    }
}

/// Users who blocked the bot or never opened a private chat will not become
/// reachable by retrying.
fn delivery_error(user_id: i64, err: RequestError) -> BotError {
    match err {
        RequestError::Api(
            api @ (ApiError::BotBlocked
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation),
        ) => BotError::Undeliverable(format!("telegram user {}: {}", user_id, api)),
        other => BotError::Unavailable(format!("telegram send to {}: {}", user_id, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_users_are_undeliverable() {
        for api in [ApiError::BotBlocked, ApiError::ChatNotFound, ApiError::UserDeactivated] {
            assert!(matches!(delivery_error(5, RequestError::Api(api)), BotError::Undeliverable(_)));
        }
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let err = delivery_error(5, RequestError::Api(ApiError::Unknown("Bad Gateway".into())));
        assert!(matches!(err, BotError::Unavailable(_)));
    }
}
