use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest quote for a single ticker, normalized across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<u64>,
    pub day_low: Option<f64>,
    pub day_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub week52_high: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    /// Name of the provider that produced the quote.
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the quote was synthesized by the offline demo provider.
    #[serde(default)]
    pub is_demo: bool,
}

impl StockQuote {
    /// Build a quote from a price and the previous close, deriving the change fields.
    pub fn from_prices(symbol: &str, price: f64, previous_close: f64, source: &str) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Self {
            symbol: symbol.to_string(),
            company_name: None,
            price,
            change,
            change_percent,
            volume: None,
            day_low: None,
            day_high: None,
            week52_low: None,
            week52_high: None,
            market_cap: None,
            pe_ratio: None,
            source: source.to_string(),
            timestamp: Utc::now(),
            is_demo: false,
        }
    }

    pub fn display_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(&self.symbol)
    }

    pub fn direction(&self) -> PriceDirection {
        PriceDirection::from_change(self.change_percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

impl PriceDirection {
    pub fn from_change(change_percent: f64) -> Self {
        if change_percent > 0.0 {
            PriceDirection::Up
        } else if change_percent < 0.0 {
            PriceDirection::Down
        } else {
            PriceDirection::Flat
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PriceDirection::Up => "🟢",
            PriceDirection::Down => "🔴",
            PriceDirection::Flat => "⚪",
        }
    }
}

/// Market index level shown by `/market`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub symbol: String,
    pub value: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSentiment {
    Bullish,
    Bearish,
    Mixed,
}

impl MarketSentiment {
    /// Classify the average index move: beyond half a percent either way is directional.
    pub fn from_average_change(avg_change_percent: f64) -> Self {
        if avg_change_percent > 0.5 {
            MarketSentiment::Bullish
        } else if avg_change_percent < -0.5 {
            MarketSentiment::Bearish
        } else {
            MarketSentiment::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketSentiment::Bullish => "🐂 Bullish",
            MarketSentiment::Bearish => "🐻 Bearish",
            MarketSentiment::Mixed => "⚖️ Mixed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub indices: Vec<IndexQuote>,
    pub sentiment: MarketSentiment,
    pub timestamp: DateTime<Utc>,
}

impl MarketSummary {
    pub fn new(indices: Vec<IndexQuote>) -> Self {
        let avg = if indices.is_empty() {
            0.0
        } else {
            indices.iter().map(|i| i.change_percent).sum::<f64>() / indices.len() as f64
        };

        Self {
            sentiment: MarketSentiment::from_average_change(avg),
            indices,
            timestamp: Utc::now(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.indices.iter().any(|i| i.is_demo)
    }
}

/// Whether the exchange is currently trading, as reported by the broker clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketClock {
    pub is_open: bool,
    pub next_open: Option<DateTime<Utc>>,
    pub next_close: Option<DateTime<Utc>>,
}

/// Lookback window for `/chart` and `/analyze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    OneWeek,
    #[default]
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl ChartPeriod {
    pub fn days(&self) -> i64 {
        match self {
            ChartPeriod::OneWeek => 7,
            ChartPeriod::OneMonth => 30,
            ChartPeriod::ThreeMonths => 90,
            ChartPeriod::SixMonths => 180,
            ChartPeriod::OneYear => 365,
        }
    }

    /// Range token understood by the Yahoo chart endpoint.
    pub fn yahoo_range(&self) -> &'static str {
        match self {
            ChartPeriod::OneWeek => "5d",
            ChartPeriod::OneMonth => "1mo",
            ChartPeriod::ThreeMonths => "3mo",
            ChartPeriod::SixMonths => "6mo",
            ChartPeriod::OneYear => "1y",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartPeriod::OneWeek => "1 Week",
            ChartPeriod::OneMonth => "1 Month",
            ChartPeriod::ThreeMonths => "3 Months",
            ChartPeriod::SixMonths => "6 Months",
            ChartPeriod::OneYear => "1 Year",
        }
    }
}

impl FromStr for ChartPeriod {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1W" | "5D" => Ok(ChartPeriod::OneWeek),
            "1M" | "1MO" => Ok(ChartPeriod::OneMonth),
            "3M" | "3MO" => Ok(ChartPeriod::ThreeMonths),
            "6M" | "6MO" => Ok(ChartPeriod::SixMonths),
            "1Y" => Ok(ChartPeriod::OneYear),
            other => Err(BotError::InvalidInput(format!(
                "unknown period '{}' (use 1W, 1M, 3M, 6M or 1Y)",
                other
            ))),
        }
    }
}

/// Price condition attached to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
    Cross,
}

impl AlertCondition {
    /// Evaluate the condition for `current`, given the last price observed for the alert.
    ///
    /// `Cross` needs a previous observation: it fires when the target lies on the
    /// segment moved through since then, in either direction.
    pub fn is_met(&self, previous: Option<f64>, current: f64, target: f64) -> bool {
        match self {
            AlertCondition::Above => current >= target,
            AlertCondition::Below => current <= target,
            AlertCondition::Cross => match previous {
                Some(prev) => {
                    (prev < target && current >= target) || (prev > target && current <= target)
                }
                None => false,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
            AlertCondition::Cross => "cross",
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCondition {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" | ">" | ">=" => Ok(AlertCondition::Above),
            "below" | "<" | "<=" => Ok(AlertCondition::Below),
            "cross" | "crosses" => Ok(AlertCondition::Cross),
            other => Err(BotError::InvalidInput(format!(
                "unknown condition '{}' (use above, below or cross)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            other => Err(BotError::InvalidInput(format!(
                "action must be 'buy' or 'sell', got '{}'",
                other
            ))),
        }
    }
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    WeakBuy,
    Neutral,
    WeakSell,
    Sell,
    StrongSell,
}

impl SignalStrength {
    /// Convert to numeric score (-100 to 100)
    pub fn to_score(&self) -> i32 {
        match self {
            SignalStrength::StrongBuy => 100,
            SignalStrength::Buy => 60,
            SignalStrength::WeakBuy => 30,
            SignalStrength::Neutral => 0,
            SignalStrength::WeakSell => -30,
            SignalStrength::Sell => -60,
            SignalStrength::StrongSell => -100,
        }
    }

    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 70 => SignalStrength::StrongBuy,
            s if s >= 30 => SignalStrength::Buy,
            s if s >= 5 => SignalStrength::WeakBuy,
            s if s >= -5 => SignalStrength::Neutral,
            s if s >= -30 => SignalStrength::WeakSell,
            s if s >= -70 => SignalStrength::Sell,
            _ => SignalStrength::StrongSell,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            SignalStrength::StrongBuy => "Strong Buy",
            SignalStrength::Buy => "Buy",
            SignalStrength::WeakBuy => "Weak Buy",
            SignalStrength::Neutral => "Neutral",
            SignalStrength::WeakSell => "Weak Sell",
            SignalStrength::Sell => "Sell",
            SignalStrength::StrongSell => "Strong Sell",
        }
    }
}

/// Normalize a user-typed ticker: trim, uppercase and validate.
///
/// Accepts index (`^GSPC`), share-class (`BRK.B`, `BF-B`) and FX/futures
/// (`EURUSD=X`) forms.
pub fn normalize_symbol(raw: &str) -> Result<String, BotError> {
    let symbol = raw.trim().trim_start_matches('$').to_ascii_uppercase();

    if symbol.is_empty() || symbol.len() > 12 {
        return Err(BotError::InvalidSymbol(raw.trim().to_string()));
    }

    let mut chars = symbol.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphanumeric() || c == '^')
        .unwrap_or(false);
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '='));

    if first_ok && rest_ok {
        Ok(symbol)
    } else {
        Err(BotError::InvalidSymbol(raw.trim().to_string()))
    }
}
