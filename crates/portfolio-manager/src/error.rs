use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Invalid alert: {0}")]
    InvalidAlert(String),

    #[error("Watchlist is full ({0} symbols max)")]
    WatchlistFull(usize),

    #[error("Too many active alerts ({0} max)")]
    AlertLimit(usize),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type PortfolioResult<T> = Result<T, PortfolioError>;
