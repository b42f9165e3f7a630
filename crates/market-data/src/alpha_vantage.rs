use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::time::Duration;
use tradeai_core::{Bar, BotError, ChartPeriod, QuoteProvider, StockQuote};

use crate::{check_status, transport_error};

const BASE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            client,
            base_url: base_url.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("ALPHA_VANTAGE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
    }

    async fn query(&self, function: &str, symbol: &str, extra: &[(&str, &str)]) -> Result<Value, BotError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("function", function),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        params.extend_from_slice(extra);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error("Alpha Vantage", e))?;

        let response = check_status("Alpha Vantage", symbol, response).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| BotError::Provider(format!("Alpha Vantage: invalid JSON: {}", e)))?;

        check_api_messages(symbol, &json)?;
        Ok(json)
    }
}

/// Alpha Vantage reports failures with HTTP 200 and a message key.
fn check_api_messages(symbol: &str, json: &Value) -> Result<(), BotError> {
    if json.get("Error Message").is_some() {
        return Err(BotError::NotFound(symbol.to_string()));
    }
    if json.get("Note").is_some() || json.get("Information").is_some() {
        return Err(BotError::RateLimited("Alpha Vantage".to_string()));
    }
    Ok(())
}

fn num(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| s.trim().trim_end_matches('%').parse::<f64>().ok())
}

/// Parse a `GLOBAL_QUOTE` response.
pub fn parse_global_quote(symbol: &str, json: &Value) -> Result<StockQuote, BotError> {
    check_api_messages(symbol, json)?;

    let data = json
        .get("Global Quote")
        .filter(|v| v.as_object().map(|o| !o.is_empty()).unwrap_or(false))
        .ok_or_else(|| BotError::NotFound(symbol.to_string()))?;

    let price = num(data.get("05. price"))
        .filter(|p| *p > 0.0)
        .ok_or_else(|| BotError::NotFound(symbol.to_string()))?;
    let previous_close = num(data.get("08. previous close")).unwrap_or(price);

    let mut quote = StockQuote::from_prices(symbol, price, previous_close, "Alpha Vantage");
    if let Some(change) = num(data.get("09. change")) {
        quote.change = change;
    }
    if let Some(pct) = num(data.get("10. change percent")) {
        quote.change_percent = pct;
    }
    quote.day_high = num(data.get("03. high"));
    quote.day_low = num(data.get("04. low"));
    quote.volume = num(data.get("06. volume")).map(|v| v as u64);

    Ok(quote)
}

/// Parse a `TIME_SERIES_DAILY` response into bars, oldest first.
pub fn parse_daily_series(symbol: &str, json: &Value) -> Result<Vec<Bar>, BotError> {
    check_api_messages(symbol, json)?;

    let series = json
        .get("Time Series (Daily)")
        .and_then(|v| v.as_object())
        .ok_or_else(|| BotError::NotFound(format!("{} (no history)", symbol)))?;

    let mut bars: Vec<Bar> = series
        .iter()
        .filter_map(|(date, row)| {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let timestamp = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?);
            Some(Bar {
                timestamp,
                open: num(row.get("1. open"))?,
                high: num(row.get("2. high"))?,
                low: num(row.get("3. low"))?,
                close: num(row.get("4. close"))?,
                volume: num(row.get("5. volume")).unwrap_or(0.0),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        let json = self.query("GLOBAL_QUOTE", symbol, &[]).await?;
        parse_global_quote(symbol, &json)
    }

    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let outputsize = if period.days() > 100 { "full" } else { "compact" };
        let json = self
            .query("TIME_SERIES_DAILY", symbol, &[("outputsize", outputsize)])
            .await?;
        let bars = parse_daily_series(symbol, &json)?;

        let cutoff = Utc::now() - chrono::Duration::days(period.days());
        Ok(bars.into_iter().filter(|b| b.timestamp >= cutoff).collect())
    }
}
