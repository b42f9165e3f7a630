use std::collections::HashMap;

use portfolio_manager::PortfolioError;
use teloxide::utils::html::escape;
use tradeai_core::TradeAction;

use crate::handler::{send, Handler, HandlerResult, ReplySender};
use crate::messages;

/// Trades listed by `/trades`.
const TRADE_HISTORY_LIMIT: i64 = 15;

impl Handler {
    pub(crate) async fn handle_trade(
        &self,
        user_id: i64,
        action: TradeAction,
        symbol: &str,
        quantity: f64,
        price: f64,
        replies: &ReplySender,
    ) -> HandlerResult {
        match self.trades.record_trade(user_id, action, symbol, quantity, price).await {
            Ok(trade) => send(replies, messages::format_trade_recorded(&trade)),
            Err(PortfolioError::InvalidTrade(reason)) => {
                send(replies, format!("❌ Invalid trade: {}", escape(&reason)))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub(crate) async fn handle_trades(&self, user_id: i64, replies: &ReplySender) -> HandlerResult {
        let stats = self.trades.trade_stats(user_id).await?;
        let trades = self.trades.recent_trades(user_id, TRADE_HISTORY_LIMIT).await?;
        send(replies, messages::fit_message(&messages::format_trades(&stats, &trades)));
        Ok(())
    }

    pub(crate) async fn handle_portfolio(&self, user_id: i64, replies: &ReplySender) -> HandlerResult {
        let holdings = self.portfolio.holdings(user_id).await?;
        if holdings.is_empty() {
            send(replies, messages::EMPTY_PORTFOLIO);
            return Ok(());
        }

        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        let mut quotes = HashMap::new();
        for (symbol, result) in self.market.get_quotes(&symbols).await {
            match result {
                Ok(quote) => {
                    quotes.insert(symbol, quote);
                }
                Err(e) => tracing::warn!(symbol, error = %e, "portfolio quote unavailable, valuing at cost"),
            }
        }

        let summary = self.portfolio.summary(user_id, &holdings, &quotes).await?;
        send(replies, messages::fit_message(&messages::format_portfolio(&summary)));
        Ok(())
    }

    pub(crate) async fn handle_watchlist_show(&self, user_id: i64, replies: &ReplySender) -> HandlerResult {
        let symbols = self.watchlist.list(user_id).await?;
        let entries = if symbols.is_empty() {
            Vec::new()
        } else {
            self.market.get_quotes(&symbols).await
        };
        send(replies, messages::fit_message(&messages::format_watchlist(&entries)));
        Ok(())
    }

    pub(crate) async fn handle_watchlist_add(&self, user_id: i64, symbol: &str, replies: &ReplySender) -> HandlerResult {
        let symbol_html = escape(symbol);
        match self.watchlist.add(user_id, symbol).await {
            Ok(true) => send(replies, format!("✅ Added <b>{}</b> to your watchlist.", symbol_html)),
            Ok(false) => send(replies, format!("ℹ️ <b>{}</b> is already on your watchlist.", symbol_html)),
            Err(PortfolioError::WatchlistFull(max)) => send(
                replies,
                format!(
                    "❌ Your watchlist is full ({} symbols max). Remove one with /watchlist remove SYMBOL",
                    max
                ),
            ),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub(crate) async fn handle_watchlist_remove(
        &self,
        user_id: i64,
        symbol: &str,
        replies: &ReplySender,
    ) -> HandlerResult {
        let symbol_html = escape(symbol);
        if self.watchlist.remove(user_id, symbol).await? {
            send(replies, format!("🗑️ Removed <b>{}</b> from your watchlist.", symbol_html));
        } else {
            send(replies, format!("ℹ️ <b>{}</b> is not on your watchlist.", symbol_html));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::tests::{test_handler, texts};
    use portfolio_manager::MAX_WATCHLIST_SIZE;

    #[tokio::test]
    async fn test_trade_then_portfolio() {
        let handler = test_handler().await;

        let replies = handler.replies_for(42, "/trade buy AAPL 10 150").await;
        let text = texts(&replies)[0];
        assert!(text.contains("Trade Recorded"));
        assert!(text.contains("<b>Total:</b> $1,500.00"));

        handler.replies_for(42, "/trade buy MSFT 2 300").await;
        handler.replies_for(42, "/trade sell AAPL 4 160").await;

        let replies = handler.replies_for(42, "/portfolio").await;
        let text = texts(&replies)[0];
        assert!(text.contains("Your Portfolio"));
        assert!(text.contains("<b>AAPL</b> 6 @ $150.00"));
        assert!(text.contains("<b>MSFT</b> 2 @ $300.00"));
        assert!(text.contains("Recent Activity"));

        // Other users see their own, empty, portfolio
        let replies = handler.replies_for(7, "/portfolio").await;
        assert!(texts(&replies)[0].contains("Your portfolio is empty"));
    }

    #[tokio::test]
    async fn test_oversized_trade_rejected() {
        let handler = test_handler().await;
        let replies = handler
            .replies_for(42, "/trade buy AAPL 100000000000000000000 100000000000000000000")
            .await;
        assert!(texts(&replies)[0].starts_with("❌ Invalid trade: quantity cannot exceed"));

        let replies = handler.replies_for(42, "/portfolio").await;
        assert!(texts(&replies)[0].contains("Your portfolio is empty"));
    }

    #[tokio::test]
    async fn test_trade_history_newest_first() {
        let handler = test_handler().await;
        let replies = handler.replies_for(1, "/trades").await;
        assert!(texts(&replies)[0].contains("No trades recorded yet"));

        handler.replies_for(1, "/trade buy AAPL 1 100").await;
        handler.replies_for(1, "/trade buy TSLA 1 200").await;

        let replies = handler.replies_for(1, "/trades").await;
        let text = texts(&replies)[0];
        assert!(text.contains("2 trades (2 buys, 0 sells)"));
        assert!(text.find("TSLA").unwrap() < text.find("AAPL").unwrap());
    }

    #[tokio::test]
    async fn test_watchlist_flow() {
        let handler = test_handler().await;

        let replies = handler.replies_for(5, "/watchlist").await;
        assert!(texts(&replies)[0].contains("Your watchlist is empty"));

        let replies = handler.replies_for(5, "/watchlist add nvda").await;
        assert!(texts(&replies)[0].contains("Added <b>NVDA</b>"));
        let replies = handler.replies_for(5, "/watchlist add NVDA").await;
        assert!(texts(&replies)[0].contains("already on your watchlist"));
        handler.replies_for(5, "/watchlist add AAPL").await;

        let replies = handler.replies_for(5, "/watchlist").await;
        let text = texts(&replies)[0];
        assert!(text.contains("(2 stocks)"));
        assert!(text.contains("NVDA") && text.contains("AAPL"));
        assert!(text.contains("Average change"));

        let replies = handler.replies_for(5, "/watchlist remove AAPL").await;
        assert!(texts(&replies)[0].contains("Removed <b>AAPL</b>"));
        let replies = handler.replies_for(5, "/watchlist remove AAPL").await;
        assert!(texts(&replies)[0].contains("is not on your watchlist"));
    }

    #[tokio::test]
    async fn test_watchlist_full() {
        let handler = test_handler().await;
        for i in 0..MAX_WATCHLIST_SIZE {
            handler.replies_for(9, &format!("/watchlist add S{}", i)).await;
        }
        let replies = handler.replies_for(9, "/watchlist add ONEMORE").await;
        assert!(texts(&replies)[0].contains("Your watchlist is full (20 symbols max)"));
    }
}
