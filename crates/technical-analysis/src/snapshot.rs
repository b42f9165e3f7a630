use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradeai_core::{Bar, SignalStrength};

use crate::indicators::{price_range, rsi, sma, support_resistance};

const MIN_BARS: usize = 21;
const SR_LOOKBACK: usize = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TechnicalError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Bullish => "📈 Uptrend",
            Trend::Bearish => "📉 Downtrend",
            Trend::Sideways => "➡️ Sideways",
        }
    }
}

/// Indicator summary feeding `/analyze` and the analysis prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub last_close: f64,
    pub sma20: f64,
    pub sma50: Option<f64>,
    pub rsi14: Option<f64>,
    pub support: f64,
    pub resistance: f64,
    pub trend: Trend,
    pub signal: SignalStrength,
    pub bars_used: usize,
}

impl TechnicalSnapshot {
    pub fn from_bars(bars: &[Bar]) -> Result<Self, TechnicalError> {
        if bars.len() < MIN_BARS {
            return Err(TechnicalError::InsufficientData(format!(
                "need at least {} bars, got {}",
                MIN_BARS,
                bars.len()
            )));
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last_close = closes[closes.len() - 1];

        let sma20 = sma(&closes, 20).last().copied().unwrap_or(last_close);
        let sma50 = sma(&closes, 50).last().copied();
        let rsi14 = rsi(&closes, 14).last().copied();

        let pivots = support_resistance(bars, SR_LOOKBACK.min(bars.len()));
        let (range_low, range_high) = price_range(bars, 20).unwrap_or((last_close, last_close));
        let support = pivots.support.unwrap_or(range_low);
        let resistance = pivots.resistance.unwrap_or(range_high);

        let trend = classify_trend(last_close, sma20, sma50);
        let signal = SignalStrength::from_score(composite_score(last_close, sma20, sma50, rsi14));

        Ok(Self {
            last_close,
            sma20,
            sma50,
            rsi14,
            support,
            resistance,
            trend,
            signal,
            bars_used: bars.len(),
        })
    }

    pub fn rsi_zone(&self) -> &'static str {
        match self.rsi14 {
            Some(v) if v >= 70.0 => "Overbought",
            Some(v) if v <= 30.0 => "Oversold",
            Some(_) => "Neutral",
            None => "n/a",
        }
    }
}

fn classify_trend(price: f64, sma20: f64, sma50: Option<f64>) -> Trend {
    match sma50 {
        Some(s50) if price > sma20 && sma20 > s50 => Trend::Bullish,
        Some(s50) if price < sma20 && sma20 < s50 => Trend::Bearish,
        None if price > sma20 * 1.01 => Trend::Bullish,
        None if price < sma20 * 0.99 => Trend::Bearish,
        _ => Trend::Sideways,
    }
}

/// Weighted vote of price-vs-average and RSI, normalized to -100..100.
fn composite_score(price: f64, sma20: f64, sma50: Option<f64>, rsi14: Option<f64>) -> i32 {
    let mut signals: Vec<(bool, i32)> = vec![(price > sma20, 2)];

    if let Some(s50) = sma50 {
        signals.push((price > s50, 2));
        signals.push((sma20 > s50, 1));
    }

    if let Some(r) = rsi14 {
        if r <= 30.0 {
            signals.push((true, 2));
        } else if r >= 70.0 {
            signals.push((false, 2));
        } else {
            signals.push((r > 50.0, 1));
        }
    }

    let total_weight: i32 = signals.iter().map(|(_, w)| w).sum();
    let total_score: i32 = signals
        .iter()
        .map(|(bullish, w)| if *bullish { *w } else { -w })
        .sum();

    if total_weight == 0 {
        return 0;
    }
    (total_score as f64 / total_weight as f64 * 100.0) as i32
}
