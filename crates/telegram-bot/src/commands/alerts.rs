use portfolio_manager::{NewAlert, PortfolioError};
use teloxide::utils::html::escape;
use tradeai_core::AlertCondition;

use crate::handler::{send, Handler, HandlerResult, ReplySender};
use crate::messages;

impl Handler {
    pub(crate) async fn handle_alert(
        &self,
        user_id: i64,
        symbol: &str,
        condition: AlertCondition,
        target: f64,
        replies: &ReplySender,
    ) -> HandlerResult {
        // A live price seeds `cross` alerts; creation still succeeds without it.
        let reference_price = match self.market.get_quote(symbol).await {
            Ok(quote) if !quote.is_demo => Some(quote.price),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(symbol, error = %e, "no reference price for new alert");
                None
            }
        };

        let request = NewAlert {
            user_id,
            symbol: symbol.to_string(),
            condition,
            target_price: target,
            reference_price,
        };

        match self.alerts.create_alert(request).await {
            Ok(alert) => send(replies, messages::format_alert_created(&alert)),
            Err(PortfolioError::AlertLimit(max)) => send(
                replies,
                format!(
                    "❌ You already have {} active alerts. Remove one with /remove_alert ID first.",
                    max
                ),
            ),
            Err(PortfolioError::InvalidAlert(reason)) => {
                send(replies, format!("❌ Invalid alert: {}", escape(&reason)))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub(crate) async fn handle_alerts(&self, user_id: i64, replies: &ReplySender) -> HandlerResult {
        let alerts = self.alerts.user_alerts(user_id).await?;
        send(replies, messages::fit_message(&messages::format_alerts(&alerts)));
        Ok(())
    }

    pub(crate) async fn handle_remove_alert(&self, user_id: i64, id: i64, replies: &ReplySender) -> HandlerResult {
        if self.alerts.cancel_alert(user_id, id).await? {
            send(replies, format!("🗑️ Alert #{} removed.", id));
        } else {
            send(replies, format!("❌ No active alert #{} found. See your alerts with /alerts", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::tests::{test_handler, texts};

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let handler = test_handler().await;

        let replies = handler.replies_for(3, "/alert aapl above 500").await;
        let text = texts(&replies)[0];
        assert!(text.contains("Alert Set!"));
        assert!(text.contains("<b>AAPL</b> goes above $500.00"));
        assert!(text.contains("Alert ID: #1"));
        // Demo prices are never stored as the alert's reference
        assert!(!text.contains("Current price"));
        let stored = handler.alerts.get_alert(1).await.unwrap().unwrap();
        assert_eq!(stored.reference_price, None);

        handler.replies_for(3, "/alert TSLA cross 200").await;

        let replies = handler.replies_for(3, "/alerts").await;
        let text = texts(&replies)[0];
        assert!(text.contains("Your Active Alerts</b> (2)"));
        assert!(text.contains("#2 <b>TSLA</b> crosses $200.00"));

        // Only the owner can remove an alert
        let replies = handler.replies_for(4, "/remove_alert 1").await;
        assert!(texts(&replies)[0].contains("No active alert #1"));

        let replies = handler.replies_for(3, "/remove_alert #1").await;
        assert_eq!(texts(&replies)[0], "🗑️ Alert #1 removed.");

        let replies = handler.replies_for(3, "/alerts").await;
        assert!(texts(&replies)[0].contains("(1)"));
    }

    #[tokio::test]
    async fn test_alerts_empty_and_usage() {
        let handler = test_handler().await;
        let replies = handler.replies_for(8, "/alerts").await;
        assert!(texts(&replies)[0].contains("You have no active alerts"));

        let replies = handler.replies_for(8, "/alert AAPL").await;
        assert!(texts(&replies)[0].starts_with("Usage: /alert"));
    }
}
