use crate::db::PortfolioDb;
use crate::error::{PortfolioError, PortfolioResult};
use crate::models::*;
use chrono::Utc;
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use tradeai_core::TradeAction;

/// Largest share quantity accepted for one trade.
pub const MAX_TRADE_QUANTITY: f64 = 1_000_000_000.0;
/// Largest per-share price accepted for one trade.
pub const MAX_TRADE_PRICE: f64 = 10_000_000.0;

#[derive(Clone)]
pub struct TradeLogger {
    db: PortfolioDb,
}

impl TradeLogger {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Record a trade for `user_id`. Quantity and price must be positive and
    /// within [`MAX_TRADE_QUANTITY`] / [`MAX_TRADE_PRICE`].
    pub async fn record_trade(
        &self,
        user_id: i64,
        action: TradeAction,
        symbol: &str,
        quantity: f64,
        price: f64,
    ) -> PortfolioResult<Trade> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(PortfolioError::InvalidTrade("quantity must be a positive number".into()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(PortfolioError::InvalidTrade("price must be a positive number".into()));
        }
        if quantity > MAX_TRADE_QUANTITY {
            return Err(PortfolioError::InvalidTrade(format!(
                "quantity cannot exceed {}",
                MAX_TRADE_QUANTITY
            )));
        }
        if price > MAX_TRADE_PRICE {
            return Err(PortfolioError::InvalidTrade(format!("price cannot exceed {}", MAX_TRADE_PRICE)));
        }

        let trade = sqlx::query_as::<_, Trade>(
            r#"
            INSERT INTO trades (user_id, symbol, action, quantity, price, executed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(action.as_str())
        .bind(quantity)
        .bind(price)
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(
            user_id,
            trade_id = trade.id,
            symbol,
            action = action.as_str(),
            quantity,
            price,
            "Trade recorded"
        );

        Ok(trade)
    }

    /// Trades for a user, newest first.
    pub async fn recent_trades(&self, user_id: i64, limit: i64) -> PortfolioResult<Vec<Trade>> {
        let trades = sqlx::query_as::<_, Trade>(
            "SELECT * FROM trades WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(trades)
    }

    /// Every trade for a user in execution order.
    pub async fn all_trades(&self, user_id: i64) -> PortfolioResult<Vec<Trade>> {
        let trades = sqlx::query_as::<_, Trade>(
            "SELECT * FROM trades WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(trades)
    }

    pub async fn holdings(&self, user_id: i64) -> PortfolioResult<Vec<Holding>> {
        let trades = self.all_trades(user_id).await?;
        Ok(compute_holdings(&trades))
    }

    pub async fn trade_stats(&self, user_id: i64) -> PortfolioResult<TradeStats> {
        let (total_trades, buys, sells, total_volume, unique_symbols): (i64, i64, i64, f64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN action = 'buy' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN action = 'sell' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(quantity * price), 0.0),
                    COUNT(DISTINCT symbol)
                FROM trades
                WHERE user_id = ?
                "#,
            )
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(TradeStats {
            total_trades,
            buys,
            sells,
            total_volume,
            unique_symbols,
        })
    }
}

/// Fold trades (oldest first) into open positions with a weighted-average cost.
///
/// Sells reduce quantity at the existing average; a position that reaches zero
/// (or below) is closed, and a sell of a symbol not held is ignored. A buy whose
/// cost overflows `Decimal` is skipped with a warning.
pub fn compute_holdings(trades: &[Trade]) -> Vec<Holding> {
    let mut book: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();

    for trade in trades {
        let (Some(qty), Some(price)) = (Decimal::from_f64(trade.quantity), Decimal::from_f64(trade.price)) else {
            tracing::warn!(trade_id = trade.id, "skipping trade with non-finite values");
            continue;
        };
        if qty <= Decimal::ZERO {
            continue;
        }

        match trade.action() {
            Ok(TradeAction::Buy) => {
                let entry = book.entry(trade.symbol.clone()).or_insert((Decimal::ZERO, Decimal::ZERO));
                let (held, avg) = *entry;
                let Some((new_qty, new_avg)) = weighted_buy(held, avg, qty, price) else {
                    tracing::warn!(trade_id = trade.id, symbol = %trade.symbol, "skipping trade that overflows cost basis");
                    continue;
                };
                *entry = (new_qty, new_avg);
            }
            Ok(TradeAction::Sell) => {
                let Some(entry) = book.get_mut(&trade.symbol) else {
                    continue;
                };
                entry.0 -= qty;
                if entry.0 <= Decimal::ZERO {
                    book.remove(&trade.symbol);
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable trade"),
        }
    }

    book.into_iter()
        .map(|(symbol, (qty, avg))| Holding {
            symbol,
            quantity: qty.to_f64().unwrap_or(0.0),
            avg_price: avg.round_dp(6).to_f64().unwrap_or(0.0),
        })
        .collect()
}

fn weighted_buy(held: Decimal, avg: Decimal, qty: Decimal, price: Decimal) -> Option<(Decimal, Decimal)> {
    let new_qty = held.checked_add(qty)?;
    let cost = held.checked_mul(avg)?.checked_add(qty.checked_mul(price)?)?;
    Some((new_qty, cost.checked_div(new_qty)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(id: i64, action: &str, symbol: &str, quantity: f64, price: f64) -> Trade {
        Trade {
            id,
            user_id: 1,
            symbol: symbol.to_string(),
            action: action.to_string(),
            quantity,
            price,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_weighted_average_cost() {
        let trades = vec![
            trade(1, "buy", "AAPL", 10.0, 100.0),
            trade(2, "buy", "AAPL", 10.0, 110.0),
        ];
        let holdings = compute_holdings(&trades);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 20.0);
        assert!((holdings[0].avg_price - 105.0).abs() < 1e-9);
        assert!((holdings[0].cost_basis() - 2100.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_and_full_sells() {
        let trades = vec![
            trade(1, "buy", "TSLA", 5.0, 200.0),
            trade(2, "buy", "MSFT", 2.0, 400.0),
            trade(3, "sell", "TSLA", 2.0, 250.0),
            trade(4, "sell", "MSFT", 2.0, 420.0),
        ];
        let holdings = compute_holdings(&trades);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "TSLA");
        assert_eq!(holdings[0].quantity, 3.0);
        // Selling does not change the average cost
        assert_eq!(holdings[0].avg_price, 200.0);
    }

    #[test]
    fn test_orphan_sell_ignored() {
        let trades = vec![
            trade(1, "sell", "NVDA", 1.0, 800.0),
            trade(2, "buy", "NVDA", 1.0, 820.0),
        ];
        let holdings = compute_holdings(&trades);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 1.0);
        assert_eq!(holdings[0].avg_price, 820.0);
    }

    #[test]
    fn test_oversell_closes_position() {
        let trades = vec![
            trade(1, "buy", "V", 1.0, 275.0),
            trade(2, "sell", "V", 3.0, 280.0),
        ];
        assert!(compute_holdings(&trades).is_empty());
    }

    #[test]
    fn test_overflowing_buy_is_skipped() {
        let trades = vec![
            trade(1, "buy", "AAPL", 2.0, 100.0),
            trade(2, "buy", "AAPL", 1e20, 1e20),
            trade(3, "buy", "MSFT", 1.0, 400.0),
        ];
        let holdings = compute_holdings(&trades);
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "AAPL");
        assert_eq!(holdings[0].quantity, 2.0);
        assert_eq!(holdings[0].avg_price, 100.0);
        assert_eq!(holdings[1].symbol, "MSFT");
    }

    #[tokio::test]
    async fn test_record_and_query_trades() {
        let db = PortfolioDb::in_memory().await.unwrap();
        let logger = TradeLogger::new(db);

        let t1 = logger.record_trade(7, TradeAction::Buy, "AAPL", 10.0, 150.0).await.unwrap();
        let t2 = logger.record_trade(7, TradeAction::Sell, "AAPL", 4.0, 160.0).await.unwrap();
        logger.record_trade(8, TradeAction::Buy, "MSFT", 1.0, 400.0).await.unwrap();

        assert!(t2.id > t1.id);
        assert_eq!(t1.total(), 1500.0);

        let recent = logger.recent_trades(7, 15).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, t2.id);

        let holdings = logger.holdings(7).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 6.0);

        let stats = logger.trade_stats(7).await.unwrap();
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.buys, 1);
        assert_eq!(stats.sells, 1);
        assert_eq!(stats.unique_symbols, 1);
        assert!((stats.total_volume - 2140.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rejects_invalid_trades() {
        let db = PortfolioDb::in_memory().await.unwrap();
        let logger = TradeLogger::new(db);

        assert!(matches!(
            logger.record_trade(1, TradeAction::Buy, "AAPL", 0.0, 10.0).await,
            Err(PortfolioError::InvalidTrade(_))
        ));
        assert!(matches!(
            logger.record_trade(1, TradeAction::Buy, "AAPL", 1.0, -5.0).await,
            Err(PortfolioError::InvalidTrade(_))
        ));
        assert!(matches!(
            logger.record_trade(1, TradeAction::Buy, "AAPL", f64::NAN, 5.0).await,
            Err(PortfolioError::InvalidTrade(_))
        ));
        assert!(matches!(
            logger.record_trade(1, TradeAction::Buy, "AAPL", 1e20, 1e20).await,
            Err(PortfolioError::InvalidTrade(_))
        ));
        assert!(matches!(
            logger.record_trade(1, TradeAction::Buy, "AAPL", 1.0, MAX_TRADE_PRICE * 2.0).await,
            Err(PortfolioError::InvalidTrade(_))
        ));
        assert!(logger.holdings(1).await.unwrap().is_empty());

        let stats = logger.trade_stats(1).await.unwrap();
        assert_eq!(stats, TradeStats::default());
    }
}
