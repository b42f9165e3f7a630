use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;
use tradeai_core::{Bar, BotError, ChartPeriod, MarketClock, QuoteProvider, StockQuote};

use crate::{check_status, transport_error};

const DEFAULT_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(rename = "latestTrade")]
    latest_trade: Option<LatestTrade>,
    #[serde(rename = "dailyBar")]
    daily_bar: Option<AlpacaBar>,
    #[serde(rename = "prevDailyBar")]
    prev_daily_bar: Option<AlpacaBar>,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    #[serde(rename = "p")]
    price: f64,
    #[serde(rename = "t")]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    is_open: bool,
    next_open: Option<DateTime<Utc>>,
    next_close: Option<DateTime<Utc>>,
}

/// Alpaca market-data and clock client (read-only; no order routing).
pub struct AlpacaDataClient {
    client: Client,
    trading_url: String,
    data_url: String,
}

impl AlpacaDataClient {
    pub fn new(api_key: &str, secret_key: &str, trading_url: &str) -> Result<Self, BotError> {
        Self::with_data_url(api_key, secret_key, trading_url, DATA_URL)
    }

    pub fn with_data_url(
        api_key: &str,
        secret_key: &str,
        trading_url: &str,
        data_url: &str,
    ) -> Result<Self, BotError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(api_key)
                .map_err(|_| BotError::Config("ALPACA_API_KEY contains invalid characters".into()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(secret_key)
                .map_err(|_| BotError::Config("ALPACA_API_SECRET contains invalid characters".into()))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build Alpaca client: {}", e)))?;

        Ok(Self {
            client,
            trading_url: trading_url.trim_end_matches('/').to_string(),
            data_url: data_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create client from `ALPACA_API_KEY` / `ALPACA_API_SECRET` / `ALPACA_BASE_URL`.
    /// Returns `Ok(None)` when the credentials are not configured.
    pub fn from_env() -> Result<Option<Self>, BotError> {
        let key = std::env::var("ALPACA_API_KEY").ok().filter(|v| !v.is_empty());
        let secret = std::env::var("ALPACA_API_SECRET").ok().filter(|v| !v.is_empty());
        let (Some(key), Some(secret)) = (key, secret) else {
            return Ok(None);
        };
        let base_url =
            std::env::var("ALPACA_BASE_URL").unwrap_or_else(|_| DEFAULT_TRADING_URL.to_string());

        Self::new(&key, &secret, &base_url).map(Some)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<T, BotError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error("Alpaca", e))?;

        let response = check_status("Alpaca", symbol, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BotError::Provider(format!("Alpaca: invalid response: {}", e)))
    }

    /// Current market session from the trading API clock.
    pub async fn clock(&self) -> Result<MarketClock, BotError> {
        let url = format!("{}/v2/clock", self.trading_url);
        let clock: ClockResponse = self.get_json(&url, "clock", &[]).await?;
        Ok(MarketClock {
            is_open: clock.is_open,
            next_open: clock.next_open,
            next_close: clock.next_close,
        })
    }
}

fn snapshot_to_quote(symbol: &str, snapshot: Snapshot) -> Result<StockQuote, BotError> {
    let price = snapshot
        .latest_trade
        .as_ref()
        .map(|t| t.price)
        .or_else(|| snapshot.daily_bar.as_ref().map(|b| b.close))
        .filter(|p| *p > 0.0)
        .ok_or_else(|| BotError::NotFound(symbol.to_string()))?;

    let previous_close = snapshot
        .prev_daily_bar
        .as_ref()
        .map(|b| b.close)
        .unwrap_or(price);

    let mut quote = StockQuote::from_prices(symbol, price, previous_close, "Alpaca");
    if let Some(bar) = &snapshot.daily_bar {
        quote.day_low = Some(bar.low);
        quote.day_high = Some(bar.high);
        quote.volume = Some(bar.volume as u64);
    }
    if let Some(ts) = snapshot.latest_trade.and_then(|t| t.timestamp) {
        quote.timestamp = ts;
    }
    Ok(quote)
}

#[async_trait]
impl QuoteProvider for AlpacaDataClient {
    fn name(&self) -> &str {
        "Alpaca"
    }

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        // Alpaca only carries US equities
        if symbol.starts_with('^') || symbol.contains('=') {
            return Err(BotError::Unsupported(format!("Alpaca does not quote {}", symbol)));
        }

        let url = format!("{}/v2/stocks/{}/snapshot", self.data_url, symbol);
        let snapshot: Snapshot = self.get_json(&url, symbol, &[]).await?;
        snapshot_to_quote(symbol, snapshot)
    }

    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, symbol);
        let start = Utc::now() - chrono::Duration::days(period.days());
        let query = [
            ("timeframe", "1Day".to_string()),
            ("start", start.to_rfc3339()),
            ("limit", "1000".to_string()),
            ("adjustment", "split".to_string()),
        ];

        let response: BarsResponse = self.get_json(&url, symbol, &query).await?;
        Ok(response
            .bars
            .unwrap_or_default()
            .into_iter()
            .map(|b| Bar {
                timestamp: b.timestamp,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_to_quote() {
        let raw = r#"{
            "latestTrade": { "p": 251.3, "t": "2024-03-05T15:30:00Z" },
            "dailyBar": { "t": "2024-03-05T05:00:00Z", "o": 248.0, "h": 253.0, "l": 247.1, "c": 251.0, "v": 91000000 },
            "prevDailyBar": { "t": "2024-03-04T05:00:00Z", "o": 240.0, "h": 249.0, "l": 239.0, "c": 245.0, "v": 80000000 }
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        let quote = snapshot_to_quote("TSLA", snapshot).unwrap();

        assert_eq!(quote.price, 251.3);
        assert!((quote.change - 6.3).abs() < 1e-9);
        assert_eq!(quote.day_high, Some(253.0));
        assert_eq!(quote.volume, Some(91_000_000));
        assert_eq!(quote.source, "Alpaca");
    }

    #[test]
    fn test_empty_snapshot_is_not_found() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            snapshot_to_quote("NONE", snapshot),
            Err(BotError::NotFound(_))
        ));
    }

    #[test]
    fn test_clock_deserialize() {
        let raw = r#"{"timestamp":"2024-03-05T10:00:00-05:00","is_open":true,"next_open":"2024-03-06T09:30:00-05:00","next_close":"2024-03-05T16:00:00-05:00"}"#;
        let clock: ClockResponse = serde_json::from_str(raw).unwrap();
        assert!(clock.is_open);
        assert!(clock.next_close.is_some());
    }

    #[test]
    fn test_invalid_credentials_rejected() {
        assert!(matches!(
            AlpacaDataClient::new("bad\nkey", "secret", DEFAULT_TRADING_URL),
            Err(BotError::Config(_))
        ));
    }
}
