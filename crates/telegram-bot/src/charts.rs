//! `/chart` images: chart-img.com when a key is configured, otherwise a
//! locally rendered line chart of the provider history.

use std::path::{Path, PathBuf};
use std::time::Duration;

use market_data::MarketDataService;
use plotters::prelude::*;
use tradeai_core::{Bar, BotError, ChartPeriod};

const CHART_IMG_ENDPOINT: &str = "https://api.chart-img.com/v1/tradingview/advanced-chart";
const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 450;

pub struct ChartService {
    client: reqwest::Client,
    chart_img_key: Option<String>,
}

impl ChartService {
    pub fn new(chart_img_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self { client, chart_img_key }
    }

    pub fn uses_chart_img(&self) -> bool {
        self.chart_img_key.is_some()
    }

    /// PNG bytes for `symbol` over `period`.
    pub async fn render(
        &self,
        symbol: &str,
        period: ChartPeriod,
        market: &MarketDataService,
    ) -> Result<Vec<u8>, BotError> {
        if let Some(key) = &self.chart_img_key {
            match self.fetch_chart_img(symbol, key).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => tracing::warn!(symbol, error = %e, "chart-img failed, rendering locally"),
            }
        }

        let bars = market.get_history(symbol, period).await?;
        render_line_chart(symbol, bars).await
    }

    async fn fetch_chart_img(&self, symbol: &str, key: &str) -> Result<Vec<u8>, BotError> {
        let response = self
            .client
            .get(chart_img_url(symbol, key))
            .send()
            .await
            .map_err(|e| BotError::Provider(format!("chart-img: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Provider(format!("chart-img returned {}", status)));
        }

        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("image/"));
        if !is_image {
            return Err(BotError::Provider("chart-img did not return an image".into()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Provider(format!("chart-img: {}", e.without_url())))?;
        Ok(bytes.to_vec())
    }
}

pub fn chart_img_url(symbol: &str, key: &str) -> String {
    format!(
        "{}?symbol={}&interval=1D&key={}",
        CHART_IMG_ENDPOINT, symbol, key
    )
}

/// Link sent when no chart image could be produced.
pub fn yahoo_link(symbol: &str) -> String {
    format!("https://finance.yahoo.com/quote/{}", symbol)
}

async fn render_line_chart(symbol: &str, bars: Vec<Bar>) -> Result<Vec<u8>, BotError> {
    if bars.len() < 2 {
        return Err(BotError::NotFound(format!("{} (not enough history to chart)", symbol)));
    }

    let path = temp_chart_path(symbol);
    tokio::task::spawn_blocking(move || {
        let drawn = draw_chart(&path, &bars);
        let bytes = drawn.and_then(|_| {
            std::fs::read(&path).map_err(|e| BotError::Unavailable(format!("chart file: {}", e)))
        });
        let _ = std::fs::remove_file(&path);
        bytes
    })
    .await
    .map_err(|e| BotError::Unavailable(format!("chart task: {}", e)))?
}

fn temp_chart_path(symbol: &str) -> PathBuf {
    let safe: String = symbol.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!("tradeai_{}_{}.png", safe, nanos))
}

/// Close line plus faint high/low bands. No text is drawn, so no font backend is needed.
fn draw_chart(path: &Path, bars: &[Bar]) -> Result<(), BotError> {
    let draw_err = |e: String| BotError::Unavailable(format!("chart render: {}", e));

    let low = bars.iter().map(|b| b.low.min(b.close)).fold(f64::INFINITY, f64::min);
    let high = bars.iter().map(|b| b.high.max(b.close)).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((high - low) * 0.05).max(0.01);

    let first = bars.first().map(|b| b.close).unwrap_or_default();
    let last = bars.last().map(|b| b.close).unwrap_or_default();
    let line_color = if last >= first { RGBColor(0, 200, 83) } else { RGBColor(255, 23, 68) };

    let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&RGBColor(18, 22, 33)).map_err(|e| draw_err(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(24)
        .build_cartesian_2d(0..bars.len(), (low - pad)..(high + pad))
        .map_err(|e| draw_err(e.to_string()))?;

    let band = RGBColor(120, 130, 150).stroke_width(1);
    chart
        .draw_series(LineSeries::new(bars.iter().enumerate().map(|(i, b)| (i, b.high)), band))
        .map_err(|e| draw_err(e.to_string()))?;
    chart
        .draw_series(LineSeries::new(bars.iter().enumerate().map(|(i, b)| (i, b.low)), band))
        .map_err(|e| draw_err(e.to_string()))?;
    chart
        .draw_series(LineSeries::new(
            bars.iter().enumerate().map(|(i, b)| (i, b.close)),
            line_color.stroke_width(3),
        ))
        .map_err(|e| draw_err(e.to_string()))?;

    root.present().map_err(|e| draw_err(e.to_string()))?;
    Ok(())
}
