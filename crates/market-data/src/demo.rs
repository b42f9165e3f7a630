use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tradeai_core::{Bar, BotError, ChartPeriod, QuoteProvider, StockQuote};

pub const DEMO_SOURCE: &str = "Demo Data (real-time data requires API configuration)";

/// (symbol, company name, sector, base price)
const DEMO_STOCKS: &[(&str, &str, &str, f64)] = &[
    ("AAPL", "Apple Inc.", "Technology", 185.50),
    ("MSFT", "Microsoft Corporation", "Technology", 425.00),
    ("GOOGL", "Alphabet Inc.", "Technology", 142.75),
    ("AMZN", "Amazon.com Inc.", "Consumer Cyclical", 178.25),
    ("TSLA", "Tesla Inc.", "Automotive", 252.50),
    ("META", "Meta Platforms Inc.", "Technology", 512.00),
    ("NVDA", "NVIDIA Corporation", "Technology", 825.75),
    ("BRK.B", "Berkshire Hathaway Inc.", "Financial", 415.00),
    ("JPM", "JPMorgan Chase & Co.", "Financial", 198.50),
    ("V", "Visa Inc.", "Financial Services", 275.25),
];

/// (symbol, base level, max daily move %)
const DEMO_INDICES: &[(&str, f64, f64)] = &[
    ("^GSPC", 5000.0, 1.0),
    ("^IXIC", 15000.0, 1.5),
    ("^DJI", 40000.0, 0.8),
    ("^FTSE", 7500.0, 0.5),
    ("^N225", 35000.0, 1.0),
    ("^GDAXI", 18000.0, 0.7),
];

/// Offline quote source used when every live provider is unavailable.
///
/// Prices are the base table with a random ±3% daily move; unknown tickers
/// get a stable pseudo-price derived from the symbol so repeated lookups stay
/// in the same neighbourhood.
pub struct DemoQuoteProvider {
    rng: Mutex<StdRng>,
}

impl DemoQuoteProvider {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn sector(symbol: &str) -> Option<&'static str> {
        DEMO_STOCKS
            .iter()
            .find(|(s, ..)| *s == symbol)
            .map(|(_, _, sector, _)| *sector)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    fn base_price(symbol: &str) -> f64 {
        if let Some((_, _, _, price)) = DEMO_STOCKS.iter().find(|(s, ..)| *s == symbol) {
            return *price;
        }
        if let Some((_, level, _)) = DEMO_INDICES.iter().find(|(s, ..)| *s == symbol) {
            return *level;
        }
        // FNV-1a over the ticker keeps unknown symbols stable between calls
        let hash = symbol.bytes().fold(0xcbf29ce484222325u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x100000001b3)
        });
        10.0 + (hash % 49_000) as f64 / 100.0
    }

    fn max_move(symbol: &str) -> f64 {
        DEMO_INDICES
            .iter()
            .find(|(s, ..)| *s == symbol)
            .map(|(_, _, m)| *m)
            .unwrap_or(3.0)
    }
}

impl Default for DemoQuoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for DemoQuoteProvider {
    fn name(&self) -> &str {
        "Demo"
    }

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        let base = Self::base_price(symbol);
        let max_move = Self::max_move(symbol);
        let known = DEMO_STOCKS.iter().find(|(s, ..)| *s == symbol);

        let (change_percent, volume, cap_multiple, pe) = self.with_rng(|rng| {
            (
                rng.gen_range(-max_move..=max_move),
                rng.gen_range(10_000_000u64..50_000_000),
                rng.gen_range(100.0..2000.0),
                rng.gen_range(15.0..35.0),
            )
        });

        let price = base * (1.0 + change_percent / 100.0);
        let mut quote = StockQuote::from_prices(symbol, price, base, DEMO_SOURCE);
        quote.change_percent = change_percent;
        quote.is_demo = true;
        quote.day_low = Some(price * 0.98);
        quote.day_high = Some(price * 1.02);

        if symbol.starts_with('^') {
            return Ok(quote);
        }

        quote.volume = Some(volume);
        match known {
            Some((_, name, _, _)) => {
                quote.company_name = Some(name.to_string());
                quote.week52_low = Some(base * 0.7);
                quote.week52_high = Some(base * 1.3);
                quote.market_cap = Some(base * cap_multiple * 1e9 / 100.0);
                quote.pe_ratio = Some((pe * 100.0f64).round() / 100.0);
            }
            None => {
                quote.company_name = Some(format!("{} Corporation", symbol));
            }
        }

        Ok(quote)
    }

    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let days = period.days().max(2) as usize;
        let end_price = Self::base_price(symbol);

        // Random walk backwards from the base price so the series ends near today's quote
        let steps: Vec<(f64, f64, f64)> = self.with_rng(|rng| {
            (0..days)
                .map(|_| {
                    (
                        rng.gen_range(-0.02..0.02),
                        rng.gen_range(0.0..0.015),
                        rng.gen_range(5_000_000.0..40_000_000.0),
                    )
                })
                .collect()
        });

        let mut closes = Vec::with_capacity(days);
        let mut price = end_price;
        for (ret, _, _) in steps.iter().rev() {
            closes.push(price);
            price /= 1.0 + ret;
        }
        closes.reverse();

        let start = Utc::now() - Duration::days(days as i64);
        let bars = closes
            .iter()
            .zip(steps.iter())
            .enumerate()
            .map(|(i, (&close, (ret, spread, volume)))| {
                let open = close / (1.0 + ret);
                Bar {
                    timestamp: start + Duration::days(i as i64 + 1),
                    open,
                    high: open.max(close) * (1.0 + spread),
                    low: open.min(close) * (1.0 - spread),
                    close,
                    volume: *volume,
                }
            })
            .collect();

        Ok(bars)
    }
}
