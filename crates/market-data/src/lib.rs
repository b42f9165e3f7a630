//! Quote providers and the fallback chain that serves `/price`, `/market`,
//! `/chart` and the alert monitor.

pub mod alpaca;
pub mod alpha_vantage;
pub mod circuit_breaker;
pub mod demo;
pub mod service;
pub mod yahoo;

pub use alpaca::AlpacaDataClient;
pub use alpha_vantage::AlphaVantageClient;
pub use circuit_breaker::CircuitBreaker;
pub use demo::DemoQuoteProvider;
pub use service::{MarketDataConfig, MarketDataService, ProviderStatus, MARKET_INDICES};
pub use yahoo::YahooFinanceClient;

use reqwest::StatusCode;
use tradeai_core::BotError;

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> BotError {
    if err.is_timeout() {
        BotError::Unavailable(format!("{}: request timed out", provider))
    } else {
        BotError::Provider(format!("{}: {}", provider, err.without_url()))
    }
}

/// Map a non-success HTTP status to a `BotError`, keeping provider bodies out of user-facing text.
pub(crate) async fn check_status(
    provider: &str,
    symbol: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(provider, %status, body = %body.chars().take(200).collect::<String>(), "provider returned error status");

    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => BotError::NotFound(symbol.to_string()),
        StatusCode::TOO_MANY_REQUESTS => BotError::RateLimited(provider.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BotError::Config(format!("{} rejected the credentials", provider))
        }
        s if s.is_server_error() => BotError::Unavailable(format!("{} returned {}", provider, s)),
        s => BotError::Provider(format!("{} returned {}", provider, s)),
    })
}
