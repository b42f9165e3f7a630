use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tradeai_core::{Bar, BotError, ChartPeriod, QuoteProvider, StockQuote};

use crate::{check_status, transport_error};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Keyless Yahoo Finance client built on the v8 chart endpoint.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self::with_base_url(CHART_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<Value, BotError> {
        let url = format!("{}/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| transport_error("Yahoo Finance", e))?;

        let response = check_status("Yahoo Finance", symbol, response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| BotError::Provider(format!("Yahoo Finance: invalid JSON: {}", e)))
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceClient {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        let json = self.fetch_chart(symbol, "5d").await?;
        parse_chart_quote(symbol, &json)
    }

    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let json = self.fetch_chart(symbol, period.yahoo_range()).await?;
        parse_chart_bars(symbol, &json)
    }
}

fn chart_result<'a>(symbol: &str, json: &'a Value) -> Result<&'a Value, BotError> {
    let chart = json
        .get("chart")
        .ok_or_else(|| BotError::Provider("Yahoo Finance: missing chart object".to_string()))?;

    if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(|v| v.as_str()).unwrap_or("");
        let description = err
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return if code == "Not Found" {
            Err(BotError::NotFound(symbol.to_string()))
        } else {
            Err(BotError::Provider(format!("Yahoo Finance: {}", description)))
        };
    }

    chart
        .get("result")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BotError::NotFound(symbol.to_string()))
}

/// Build a quote from the `meta` block of a chart response.
pub fn parse_chart_quote(symbol: &str, json: &Value) -> Result<StockQuote, BotError> {
    let result = chart_result(symbol, json)?;
    let meta = result
        .get("meta")
        .ok_or_else(|| BotError::Provider("Yahoo Finance: missing meta".to_string()))?;

    let f = |key: &str| meta.get(key).and_then(|v| v.as_f64());

    let price = f("regularMarketPrice")
        .filter(|p| *p > 0.0)
        .ok_or_else(|| BotError::NotFound(symbol.to_string()))?;
    // `chartPreviousClose` precedes the first bar of the range, not the last session.
    let previous_close = f("previousClose")
        .or_else(|| prior_session_close(result))
        .or_else(|| f("chartPreviousClose"))
        .unwrap_or(price);

    let mut quote = StockQuote::from_prices(symbol, price, previous_close, "Yahoo Finance");
    quote.company_name = meta
        .get("longName")
        .or_else(|| meta.get("shortName"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    quote.volume = meta.get("regularMarketVolume").and_then(|v| v.as_u64());
    quote.day_low = f("regularMarketDayLow");
    quote.day_high = f("regularMarketDayHigh");
    quote.week52_low = f("fiftyTwoWeekLow");
    quote.week52_high = f("fiftyTwoWeekHigh");
    if let Some(ts) = meta
        .get("regularMarketTime")
        .and_then(|v| v.as_i64())
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
    {
        quote.timestamp = ts;
    }

    Ok(quote)
}

/// Second-to-last non-null daily close, i.e. the session before the latest bar.
fn prior_session_close(result: &Value) -> Option<f64> {
    let closes = result
        .get("indicators")?
        .get("quote")?
        .as_array()?
        .first()?
        .get("close")?
        .as_array()?;

    closes.iter().filter_map(|v| v.as_f64()).rev().nth(1)
}

/// Daily bars from a chart response; rows with missing values are skipped.
pub fn parse_chart_bars(symbol: &str, json: &Value) -> Result<Vec<Bar>, BotError> {
    let result = chart_result(symbol, json)?;

    let timestamps = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BotError::NotFound(format!("{} (no history)", symbol)))?;

    let quote = result
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| BotError::Provider("Yahoo Finance: missing indicators".to_string()))?;

    let series = |key: &str| -> Vec<Option<f64>> {
        quote
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
            .unwrap_or_default()
    };

    let opens = series("open");
    let highs = series("high");
    let lows = series("low");
    let closes = series("close");
    let volumes = series("volume");

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp = DateTime::<Utc>::from_timestamp(ts.as_i64()?, 0)?;
            Some(Bar {
                timestamp,
                open: (*opens.get(i)?)?,
                high: (*highs.get(i)?)?,
                low: (*lows.get(i)?)?,
                close: (*closes.get(i)?)?,
                volume: volumes.get(i).copied().flatten().unwrap_or(0.0),
            })
        })
        .collect();

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_chart() -> Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "AAPL",
                        "longName": "Apple Inc.",
                        "regularMarketPrice": 189.5,
                        "chartPreviousClose": 170.0,
                        "regularMarketDayHigh": 190.2,
                        "regularMarketDayLow": 184.9,
                        "regularMarketVolume": 52_000_000u64,
                        "fiftyTwoWeekHigh": 199.6,
                        "fiftyTwoWeekLow": 164.1,
                        "regularMarketTime": 1_700_000_000i64
                    },
                    "timestamp": [1_699_800_000i64, 1_699_886_400i64, 1_699_972_800i64],
                    "indicators": {
                        "quote": [{
                            "open": [184.0, null, 186.0],
                            "high": [186.0, 187.0, 190.2],
                            "low": [183.5, 184.0, 184.9],
                            "close": [185.0, null, 189.5],
                            "volume": [40_000_000u64, 41_000_000u64, null]
                        }]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_chart_quote() {
        let quote = parse_chart_quote("AAPL", &sample_chart()).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.company_name.as_deref(), Some("Apple Inc."));
        assert!((quote.price - 189.5).abs() < 1e-9);
        // Change is against the prior session, not the start of the 5d range
        assert!((quote.change - 4.5).abs() < 1e-9);
        assert!((quote.change_percent - 4.5 / 185.0 * 100.0).abs() < 1e-9);
        assert_eq!(quote.volume, Some(52_000_000));
        assert_eq!(quote.week52_high, Some(199.6));
        assert_eq!(quote.source, "Yahoo Finance");
        assert!(!quote.is_demo);
    }

    #[test]
    fn test_previous_close_field_wins() {
        let mut json = sample_chart();
        json["chart"]["result"][0]["meta"]["previousClose"] = json!(188.0);
        let quote = parse_chart_quote("AAPL", &json).unwrap();
        assert!((quote.change - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_bar_falls_back_to_chart_previous_close() {
        let json = json!({
            "chart": {
                "result": [{
                    "meta": { "regularMarketPrice": 101.0, "chartPreviousClose": 100.0 },
                    "indicators": { "quote": [{ "close": [101.0] }] }
                }],
                "error": null
            }
        });
        let quote = parse_chart_quote("XYZ", &json).unwrap();
        assert!((quote.change - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_chart_bars_skips_null_rows() {
        let bars = parse_chart_bars("AAPL", &sample_chart()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 185.0);
        assert_eq!(bars[1].close, 189.5);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn test_not_found_error() {
        let json = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        assert!(matches!(
            parse_chart_quote("ZZZZ", &json),
            Err(BotError::NotFound(_))
        ));
    }

    #[test]
    fn test_zero_price_is_not_found() {
        let json = json!({ "chart": { "result": [{ "meta": { "regularMarketPrice": 0.0 } }], "error": null } });
        assert!(matches!(parse_chart_quote("XX", &json), Err(BotError::NotFound(_))));
    }
}
