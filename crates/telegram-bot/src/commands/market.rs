use technical_analysis::TechnicalSnapshot;
use tradeai_core::{BotError, ChartPeriod, StockQuote};

use crate::charts::yahoo_link;
use crate::handler::{send, Handler, HandlerResult, Reply, ReplySender};
use crate::messages::{self, fit_message};

/// History window behind the `/analyze` indicators.
const ANALYSIS_PERIOD: ChartPeriod = ChartPeriod::ThreeMonths;

impl Handler {
    /// Quote lookup shared by `/price` and `/analyze`. Unknown symbols are answered
    /// directly and yield `None`.
    async fn quote_or_not_found(&self, symbol: &str, replies: &ReplySender) -> Result<Option<StockQuote>, BotError> {
        match self.market.get_quote(symbol).await {
            Ok(quote) => Ok(Some(quote)),
            Err(BotError::NotFound(_)) | Err(BotError::InvalidSymbol(_)) => {
                send(
                    replies,
                    format!(
                        "❌ Could not find data for symbol {}. Please check the symbol and try again.",
                        teloxide::utils::html::escape(symbol)
                    ),
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn handle_price(&self, symbol: &str, replies: &ReplySender) -> HandlerResult {
        if let Some(quote) = self.quote_or_not_found(symbol, replies).await? {
            send(replies, messages::format_quote(&quote));
        }
        Ok(())
    }

    pub(crate) async fn handle_analyze(&self, symbol: &str, replies: &ReplySender) -> HandlerResult {
        let Some(quote) = self.quote_or_not_found(symbol, replies).await? else {
            return Ok(());
        };

        let technicals = match self.market.get_history(symbol, ANALYSIS_PERIOD).await {
            Ok(bars) => match TechnicalSnapshot::from_bars(&bars) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::debug!(symbol, error = %e, "not enough history for indicators");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(symbol, error = %e, "history unavailable for analysis");
                None
            }
        };

        let insight = self.assistant.analyze(&quote, technicals.as_ref()).await;
        send(
            replies,
            fit_message(&messages::format_analysis(&quote, technicals.as_ref(), &insight)),
        );
        Ok(())
    }

    pub(crate) async fn handle_market(&self, replies: &ReplySender) -> HandlerResult {
        let summary = self.market.market_summary().await?;
        let clock = self.market.market_clock().await;
        send(replies, messages::format_market(&summary, clock.as_ref()));
        Ok(())
    }

    pub(crate) async fn handle_chart(&self, symbol: &str, period: ChartPeriod, replies: &ReplySender) -> HandlerResult {
        match self.charts.render(symbol, period, &self.market).await {
            Ok(bytes) => {
                let caption = format!("📈 {} Chart for {}", period.label(), symbol);
                let _ = replies.send(Reply::Photo { bytes, caption });
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "chart generation failed");
                send(
                    replies,
                    format!(
                        "📈 Chart unavailable right now. View {} on Yahoo Finance:\n{}",
                        teloxide::utils::html::escape(symbol),
                        yahoo_link(symbol)
                    ),
                );
            }
        }
        Ok(())
    }
}
