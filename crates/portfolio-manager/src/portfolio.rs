use crate::db::PortfolioDb;
use crate::error::PortfolioResult;
use crate::models::*;
use crate::trades::TradeLogger;
use std::collections::HashMap;
use tradeai_core::StockQuote;

const RECENT_ACTIVITY: i64 = 5;

#[derive(Clone)]
pub struct PortfolioManager {
    trades: TradeLogger,
}

impl PortfolioManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self {
            trades: TradeLogger::new(db),
        }
    }

    pub async fn holdings(&self, user_id: i64) -> PortfolioResult<Vec<Holding>> {
        self.trades.holdings(user_id).await
    }

    /// Portfolio dashboard for a user, valued with the supplied quotes.
    pub async fn summary(
        &self,
        user_id: i64,
        holdings: &[Holding],
        quotes: &HashMap<String, StockQuote>,
    ) -> PortfolioResult<PortfolioSummary> {
        let recent_trades = self.trades.recent_trades(user_id, RECENT_ACTIVITY).await?;
        Ok(value_holdings(holdings, quotes, recent_trades))
    }
}

/// Value holdings at current quotes. Positions without a quote are carried at cost.
pub fn value_holdings(
    holdings: &[Holding],
    quotes: &HashMap<String, StockQuote>,
    recent_trades: Vec<Trade>,
) -> PortfolioSummary {
    let mut positions: Vec<PositionValue> = holdings
        .iter()
        .map(|h| {
            let quote = quotes.get(&h.symbol);
            let current_price = quote.map(|q| q.price).unwrap_or(h.avg_price);
            let market_value = h.quantity * current_price;
            let cost_basis = h.cost_basis();
            let unrealized_pnl = market_value - cost_basis;
            let unrealized_pnl_percent = if cost_basis > 0.0 {
                unrealized_pnl / cost_basis * 100.0
            } else {
                0.0
            };

            PositionValue {
                symbol: h.symbol.clone(),
                quantity: h.quantity,
                avg_price: h.avg_price,
                current_price,
                market_value,
                cost_basis,
                unrealized_pnl,
                unrealized_pnl_percent,
                allocation_percent: 0.0,
                day_change_percent: quote.map(|q| q.change_percent).unwrap_or(0.0),
                priced: quote.is_some(),
            }
        })
        .collect();

    let total_value: f64 = positions.iter().map(|p| p.market_value).sum();
    let total_cost: f64 = positions.iter().map(|p| p.cost_basis).sum();
    let total_pnl = total_value - total_cost;
    let total_pnl_percent = if total_cost > 0.0 {
        total_pnl / total_cost * 100.0
    } else {
        0.0
    };

    let mut weighted_day_change = 0.0;
    if total_value > 0.0 {
        for p in positions.iter_mut() {
            p.allocation_percent = p.market_value / total_value * 100.0;
            weighted_day_change += p.day_change_percent * p.market_value / total_value;
        }
    }

    positions.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));

    PortfolioSummary {
        positions,
        total_value,
        total_cost,
        total_pnl,
        total_pnl_percent,
        day_change_percent: weighted_day_change,
        recent_trades,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;
    use tradeai_core::TradeAction;

    fn quote(symbol: &str, price: f64, change_percent: f64) -> StockQuote {
        let mut q = StockQuote::from_prices(symbol, price, price, "test");
        q.change_percent = change_percent;
        q
    }

    #[test]
    fn test_value_holdings() {
        let holdings = vec![
            Holding { symbol: "AAPL".into(), quantity: 10.0, avg_price: 100.0 },
            Holding { symbol: "TSLA".into(), quantity: 2.0, avg_price: 250.0 },
        ];
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote("AAPL", 150.0, 2.0));
        quotes.insert("TSLA".to_string(), quote("TSLA", 200.0, -1.0));

        let summary = value_holdings(&holdings, &quotes, vec![]);

        assert_eq!(summary.total_value, 1900.0);
        assert_eq!(summary.total_cost, 1500.0);
        assert_eq!(summary.total_pnl, 400.0);
        let expected_pct = dec!(400) / dec!(1500) * dec!(100);
        assert!((summary.total_pnl_percent - expected_pct.to_f64().unwrap()).abs() < 1e-9);

        // Sorted by market value
        assert_eq!(summary.positions[0].symbol, "AAPL");
        assert!((summary.positions[0].allocation_percent - 1500.0 / 1900.0 * 100.0).abs() < 1e-9);
        assert_eq!(summary.winners(), 1);
        assert_eq!(summary.losers(), 1);
        assert_eq!(summary.largest_position().unwrap().symbol, "AAPL");
        assert_eq!(summary.smallest_position().unwrap().symbol, "TSLA");

        let expected_day = 2.0 * 1500.0 / 1900.0 - 1.0 * 400.0 / 1900.0;
        assert!((summary.day_change_percent - expected_day).abs() < 1e-9);
    }

    #[test]
    fn test_missing_quote_valued_at_cost() {
        let holdings = vec![Holding { symbol: "XYZ".into(), quantity: 3.0, avg_price: 20.0 }];
        let summary = value_holdings(&holdings, &HashMap::new(), vec![]);
        assert_eq!(summary.total_value, 60.0);
        assert_eq!(summary.total_pnl, 0.0);
        assert!(!summary.positions[0].priced);
    }

    #[tokio::test]
    async fn test_summary_includes_recent_trades() {
        let db = PortfolioDb::in_memory().await.unwrap();
        let logger = TradeLogger::new(db.clone());
        for i in 0..7 {
            logger
                .record_trade(4, TradeAction::Buy, "JPM", 1.0, 190.0 + i as f64)
                .await
                .unwrap();
        }

        let manager = PortfolioManager::new(db);
        let holdings = manager.holdings(4).await.unwrap();
        assert_eq!(holdings[0].quantity, 7.0);

        let summary = manager.summary(4, &holdings, &HashMap::new()).await.unwrap();
        assert_eq!(summary.recent_trades.len(), 5);
        assert!(summary.recent_trades[0].price > summary.recent_trades[4].price);
    }
}
