use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradeai_core::{AlertCondition, TradeAction};

use crate::error::PortfolioError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub action: String, // "buy" or "sell"
    pub quantity: f64,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    pub fn total(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn action(&self) -> Result<TradeAction, PortfolioError> {
        self.action
            .parse()
            .map_err(|_| PortfolioError::Corrupt(format!("trade {} has action '{}'", self.id, self.action)))
    }

    pub fn is_buy(&self) -> bool {
        self.action == "buy"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: i64,
    pub buys: i64,
    pub sells: i64,
    pub total_volume: f64,
    pub unique_symbols: i64,
}

/// Open position derived from the trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
}

impl Holding {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Triggered,
    Cancelled,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Triggered => "triggered",
            AlertStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceAlert {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub condition_type: String,
    pub target_price: f64,
    /// Last price observed for this alert; drives `cross` detection.
    pub reference_price: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_price: Option<f64>,
}

impl PriceAlert {
    pub fn condition(&self) -> Result<AlertCondition, PortfolioError> {
        self.condition_type.parse().map_err(|_| {
            PortfolioError::Corrupt(format!(
                "alert {} has condition '{}'",
                self.id, self.condition_type
            ))
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub user_id: i64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub target_price: f64,
    pub reference_price: Option<f64>,
}

/// A holding valued at the latest quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionValue {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub allocation_percent: f64,
    pub day_change_percent: f64,
    /// False when no quote was available and the position is valued at cost.
    pub priced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub positions: Vec<PositionValue>,
    pub total_value: f64,
    pub total_cost: f64,
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    /// Value-weighted daily move of the portfolio, in percent.
    pub day_change_percent: f64,
    pub recent_trades: Vec<Trade>,
}

impl PortfolioSummary {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn winners(&self) -> usize {
        self.positions.iter().filter(|p| p.unrealized_pnl > 0.0).count()
    }

    pub fn losers(&self) -> usize {
        self.positions.iter().filter(|p| p.unrealized_pnl < 0.0).count()
    }

    pub fn largest_position(&self) -> Option<&PositionValue> {
        self.positions
            .iter()
            .max_by(|a, b| a.market_value.total_cmp(&b.market_value))
    }

    pub fn smallest_position(&self) -> Option<&PositionValue> {
        self.positions
            .iter()
            .min_by(|a, b| a.market_value.total_cmp(&b.market_value))
    }
}
