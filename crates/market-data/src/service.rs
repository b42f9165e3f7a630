use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tradeai_core::{
    Bar, BotError, ChartPeriod, IndexQuote, MarketClock, MarketSummary, QuoteProvider, StockQuote,
};

use crate::{AlpacaDataClient, AlphaVantageClient, CircuitBreaker, DemoQuoteProvider, YahooFinanceClient};

/// (display name, symbol) of the indices shown by `/market`.
pub const MARKET_INDICES: &[(&str, &str)] = &[
    ("S&P 500", "^GSPC"),
    ("NASDAQ", "^IXIC"),
    ("DOW", "^DJI"),
    ("FTSE", "^FTSE"),
    ("NIKKEI", "^N225"),
    ("DAX", "^GDAXI"),
];

#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub cache_ttl: Duration,
    pub demo_fallback: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            demo_fallback: true,
        }
    }
}

impl MarketDataConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: std::env::var("QUOTE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            demo_fallback: std::env::var("MARKET_DATA_DEMO_FALLBACK")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(defaults.demo_fallback),
        }
    }
}

struct ProviderSlot {
    provider: Arc<dyn QuoteProvider>,
    breaker: CircuitBreaker,
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub circuit_open: bool,
    pub consecutive_failures: u32,
}

/// Ordered provider chain with per-provider circuit breakers and a short-lived quote cache.
pub struct MarketDataService {
    providers: Vec<ProviderSlot>,
    cache: DashMap<String, (Instant, StockQuote)>,
    cache_ttl: Duration,
    clock: Option<Arc<AlpacaDataClient>>,
}

impl MarketDataService {
    pub fn new(config: &MarketDataConfig) -> Self {
        Self {
            providers: Vec::new(),
            cache: DashMap::new(),
            cache_ttl: config.cache_ttl,
            clock: None,
        }
    }

    /// Build the production chain: Alpaca (if configured), Yahoo, Alpha Vantage
    /// (if configured), then demo data unless disabled.
    pub fn from_env() -> Result<Self, BotError> {
        let config = MarketDataConfig::from_env();
        let mut service = Self::new(&config);

        if let Some(alpaca) = AlpacaDataClient::from_env()? {
            let alpaca = Arc::new(alpaca);
            service.clock = Some(alpaca.clone());
            service = service.with_provider(alpaca);
        }

        service = service.with_provider(Arc::new(YahooFinanceClient::new()));

        if let Some(av) = AlphaVantageClient::from_env() {
            service = service.with_provider(Arc::new(av));
        }

        if config.demo_fallback {
            service = service.with_provider(Arc::new(DemoQuoteProvider::new()));
        }

        tracing::info!(
            providers = ?service.provider_names(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "Market data service initialized"
        );

        Ok(service)
    }

    pub fn with_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        let breaker = CircuitBreaker::new(provider.name());
        self.providers.push(ProviderSlot { provider, breaker });
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|slot| slot.provider.name().to_string())
            .collect()
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|slot| ProviderStatus {
                name: slot.provider.name().to_string(),
                circuit_open: slot.breaker.is_open(),
                consecutive_failures: slot.breaker.consecutive_failures(),
            })
            .collect()
    }

    pub fn has_market_clock(&self) -> bool {
        self.clock.is_some()
    }

    fn cached(&self, symbol: &str) -> Option<StockQuote> {
        let entry = self.cache.get(symbol)?;
        let (fetched_at, quote) = entry.value();
        if fetched_at.elapsed() < self.cache_ttl {
            Some(quote.clone())
        } else {
            None
        }
    }

    /// Latest quote for an already-normalized symbol.
    pub async fn get_quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        if let Some(quote) = self.cached(symbol) {
            return Ok(quote);
        }

        let mut last_err: Option<BotError> = None;

        for slot in &self.providers {
            if slot.breaker.is_open() {
                tracing::debug!(provider = slot.provider.name(), "skipping provider, circuit open");
                continue;
            }

            match slot.provider.quote(symbol).await {
                Ok(quote) => {
                    slot.breaker.record_success();
                    if self.cache.len() > 5_000 {
                        let ttl = self.cache_ttl;
                        self.cache.retain(|_, (ts, _)| ts.elapsed() < ttl);
                    }
                    self.cache
                        .insert(symbol.to_string(), (Instant::now(), quote.clone()));
                    return Ok(quote);
                }
                Err(e) => {
                    if e.is_upstream_failure() {
                        slot.breaker.record_failure();
                    }
                    tracing::debug!(provider = slot.provider.name(), symbol, error = %e, "quote provider failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            BotError::Unavailable("no market data provider available".to_string())
        }))
    }

    /// Quotes for several symbols, fetched concurrently. Order matches the input.
    pub async fn get_quotes(&self, symbols: &[String]) -> Vec<(String, Result<StockQuote, BotError>)> {
        let results = join_all(symbols.iter().map(|s| self.get_quote(s))).await;
        symbols.iter().cloned().zip(results).collect()
    }

    /// Daily bars for the period from the first provider that serves history.
    pub async fn get_history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        let mut last_err: Option<BotError> = None;

        for slot in &self.providers {
            if slot.breaker.is_open() {
                continue;
            }

            match slot.provider.history(symbol, period).await {
                Ok(bars) if !bars.is_empty() => {
                    slot.breaker.record_success();
                    return Ok(bars);
                }
                Ok(_) => {
                    last_err = Some(BotError::NotFound(format!("{} (no history)", symbol)));
                }
                Err(BotError::Unsupported(_)) => {}
                Err(e) => {
                    if e.is_upstream_failure() {
                        slot.breaker.record_failure();
                    }
                    tracing::debug!(provider = slot.provider.name(), symbol, error = %e, "history provider failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            BotError::Unavailable(format!("no provider serves history for {}", symbol))
        }))
    }

    /// Major index levels and the derived sentiment.
    pub async fn market_summary(&self) -> Result<MarketSummary, BotError> {
        let results = join_all(
            MARKET_INDICES
                .iter()
                .map(|(name, symbol)| async move { (*name, *symbol, self.get_quote(symbol).await) }),
        )
        .await;

        let indices: Vec<IndexQuote> = results
            .into_iter()
            .filter_map(|(name, symbol, result)| match result {
                Ok(q) => Some(IndexQuote {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    value: q.price,
                    change_percent: q.change_percent,
                    is_demo: q.is_demo,
                }),
                Err(e) => {
                    tracing::warn!(index = symbol, error = %e, "index quote unavailable");
                    None
                }
            })
            .collect();

        if indices.is_empty() {
            return Err(BotError::Unavailable("market indices unavailable".to_string()));
        }

        Ok(MarketSummary::new(indices))
    }

    /// Exchange session state; `None` when no broker clock is configured.
    pub async fn market_clock(&self) -> Option<MarketClock> {
        let clock = self.clock.as_ref()?;
        match clock.clock().await {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(error = %e, "market clock unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl QuoteProvider for MarketDataService {
    fn name(&self) -> &str {
        "MarketDataService"
    }

    async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
        self.get_quote(symbol).await
    }

    async fn history(&self, symbol: &str, period: ChartPeriod) -> Result<Vec<Bar>, BotError> {
        self.get_history(symbol, period).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: AtomicUsize,
        error: BotError,
    }

    #[async_trait]
    impl QuoteProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn quote(&self, _symbol: &str) -> Result<StockQuote, BotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    struct Fixed {
        price: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn quote(&self, symbol: &str) -> Result<StockQuote, BotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StockQuote::from_prices(symbol, self.price, self.price - 1.0, "fixed"))
        }
    }

    fn no_cache() -> MarketDataConfig {
        MarketDataConfig {
            cache_ttl: Duration::from_secs(0),
            demo_fallback: false,
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
            error: BotError::Provider("boom".into()),
        });
        let fixed = Arc::new(Fixed { price: 42.0, calls: AtomicUsize::new(0) });

        let service = MarketDataService::new(&no_cache())
            .with_provider(failing.clone())
            .with_provider(fixed.clone());

        let quote = service.get_quote("AAPL").await.unwrap();
        assert_eq!(quote.price, 42.0);
        assert_eq!(quote.source, "fixed");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_skips_failing_provider() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
            error: BotError::Unavailable("down".into()),
        });
        let fixed = Arc::new(Fixed { price: 10.0, calls: AtomicUsize::new(0) });

        let service = MarketDataService::new(&no_cache())
            .with_provider(failing.clone())
            .with_provider(fixed);

        for _ in 0..8 {
            service.get_quote("MSFT").await.unwrap();
        }

        // Opened after five consecutive failures
        assert_eq!(failing.calls.load(Ordering::SeqCst), 5);
        assert!(service.provider_status()[0].circuit_open);
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_breaker() {
        let failing = Arc::new(Failing {
            calls: AtomicUsize::new(0),
            error: BotError::NotFound("ZZZZ".into()),
        });
        let service = MarketDataService::new(&no_cache()).with_provider(failing.clone());

        for _ in 0..7 {
            assert!(matches!(service.get_quote("ZZZZ").await, Err(BotError::NotFound(_))));
        }
        assert_eq!(failing.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_cache_hit() {
        let fixed = Arc::new(Fixed { price: 5.0, calls: AtomicUsize::new(0) });
        let config = MarketDataConfig {
            cache_ttl: Duration::from_secs(60),
            demo_fallback: false,
        };
        let service = MarketDataService::new(&config).with_provider(fixed.clone());

        service.get_quote("V").await.unwrap();
        service.get_quote("V").await.unwrap();
        assert_eq!(fixed.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_unavailable() {
        let service = MarketDataService::new(&no_cache());
        assert!(matches!(
            service.get_quote("AAPL").await,
            Err(BotError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_market_summary_from_demo() {
        let service = MarketDataService::new(&no_cache())
            .with_provider(Arc::new(DemoQuoteProvider::with_seed(5)));

        let summary = service.market_summary().await.unwrap();
        assert_eq!(summary.indices.len(), MARKET_INDICES.len());
        assert!(summary.is_demo());
        assert_eq!(summary.indices[0].name, "S&P 500");
    }

    #[tokio::test]
    async fn test_history_skips_unsupported() {
        let service = MarketDataService::new(&no_cache())
            .with_provider(Arc::new(Fixed { price: 1.0, calls: AtomicUsize::new(0) }))
            .with_provider(Arc::new(DemoQuoteProvider::with_seed(2)));

        let bars = service.get_history("AAPL", ChartPeriod::OneMonth).await.unwrap();
        assert_eq!(bars.len(), 30);
    }

    #[tokio::test]
    async fn test_get_quotes_preserves_order() {
        let service = MarketDataService::new(&no_cache())
            .with_provider(Arc::new(Fixed { price: 3.0, calls: AtomicUsize::new(0) }));
        let symbols = vec!["B".to_string(), "A".to_string()];
        let results = service.get_quotes(&symbols).await;
        assert_eq!(results[0].0, "B");
        assert_eq!(results[1].1.as_ref().unwrap().symbol, "A");
    }
}
