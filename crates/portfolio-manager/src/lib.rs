pub mod alerts;
pub mod db;
pub mod error;
pub mod models;
pub mod portfolio;
pub mod trades;
pub mod watchlist;

pub use alerts::{AlertManager, MAX_ACTIVE_ALERTS_PER_USER};
pub use db::PortfolioDb;
pub use error::{PortfolioError, PortfolioResult};
pub use models::*;
pub use portfolio::{value_holdings, PortfolioManager};
pub use trades::{compute_holdings, TradeLogger, MAX_TRADE_PRICE, MAX_TRADE_QUANTITY};
pub use watchlist::{WatchlistManager, MAX_WATCHLIST_SIZE};
