use std::sync::Arc;

use ai_assistant::TradingAssistant;
use market_data::MarketDataService;
use portfolio_manager::{
    AlertManager, PortfolioDb, PortfolioError, PortfolioManager, TradeLogger, WatchlistManager,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tradeai_core::BotError;

use crate::charts::ChartService;
use crate::commands::{parse_command, CommandParseError, TelegramCommand, WatchlistAction};
use crate::rate_limit::RateLimiter;
use crate::status::BotStatus;

/// One outbound message. Text is Telegram HTML.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Photo { bytes: Vec<u8>, caption: String },
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Photo { .. } => None,
        }
    }
}

pub type ReplySender = mpsc::UnboundedSender<Reply>;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Bot(#[from] BotError),

    #[error(transparent)]
    Storage(#[from] PortfolioError),
}

pub type HandlerResult = Result<(), HandlerError>;

/// Routes Telegram messages to the command implementations in `commands/`.
pub struct Handler {
    pub(crate) market: Arc<MarketDataService>,
    pub(crate) assistant: Arc<TradingAssistant>,
    pub(crate) trades: TradeLogger,
    pub(crate) portfolio: PortfolioManager,
    pub(crate) watchlist: WatchlistManager,
    pub(crate) alerts: AlertManager,
    pub(crate) charts: ChartService,
    pub(crate) status: Arc<BotStatus>,
    pub(crate) database_persistent: bool,
    rate_limiter: RateLimiter,
}

impl Handler {
    pub fn new(
        market: Arc<MarketDataService>,
        assistant: Arc<TradingAssistant>,
        db: PortfolioDb,
        charts: ChartService,
        rate_limiter: RateLimiter,
        status: Arc<BotStatus>,
    ) -> Self {
        Self {
            market,
            assistant,
            trades: TradeLogger::new(db.clone()),
            portfolio: PortfolioManager::new(db.clone()),
            watchlist: WatchlistManager::new(db.clone()),
            alerts: AlertManager::new(db.clone()),
            charts,
            status,
            database_persistent: db.is_persistent(),
            rate_limiter,
        }
    }

    /// Handle one incoming message, pushing every reply onto `replies` in order.
    pub async fn handle_message(&self, user_id: i64, text: &str, replies: &ReplySender) {
        if let Err(wait) = self.rate_limiter.check(user_id).await {
            tracing::debug!(user_id, wait, "rate limited");
            send(replies, format!("⏳ Rate limited. Try again in {}s.", wait));
            return;
        }

        match parse_command(text) {
            Ok(command) => self.dispatch(user_id, command, replies).await,
            Err(CommandParseError::NotACommand) => {
                if let Err(e) = self.handle_free_text(user_id, text, replies).await {
                    tracing::error!(user_id, error = %e, "free text handling failed");
                    send(replies, "Sorry, I couldn't process your message. Please try again.");
                }
            }
            Err(e) => {
                tracing::debug!(user_id, error = %e, "command rejected");
                send(replies, e.user_message());
            }
        }
    }

    /// Collect the replies for one message. Used by tests and tooling.
    pub async fn replies_for(&self, user_id: i64, text: &str) -> Vec<Reply> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.handle_message(user_id, text, &tx).await;
        drop(tx);

        let mut out = Vec::new();
        while let Some(reply) = rx.recv().await {
            out.push(reply);
        }
        out
    }

    async fn dispatch(&self, user_id: i64, command: TelegramCommand, replies: &ReplySender) {
        let name = command.name();
        tracing::info!(user_id, command = name, "Handling command");

        let result = match &command {
            TelegramCommand::Start => self.handle_start(replies).await,
            TelegramCommand::Help => self.handle_help(replies).await,
            TelegramCommand::Status => self.handle_status(replies).await,
            TelegramCommand::Market => self.handle_market(replies).await,
            TelegramCommand::Portfolio => self.handle_portfolio(user_id, replies).await,
            TelegramCommand::Trades => self.handle_trades(user_id, replies).await,
            TelegramCommand::Alerts => self.handle_alerts(user_id, replies).await,
            TelegramCommand::Price { symbol } => self.handle_price(symbol, replies).await,
            TelegramCommand::Analyze { symbol } => {
                send(replies, format!("🤖 Analyzing {}...", symbol));
                self.handle_analyze(symbol, replies).await
            }
            TelegramCommand::Watchlist(action) => match action {
                WatchlistAction::Show => self.handle_watchlist_show(user_id, replies).await,
                WatchlistAction::Add(symbol) => self.handle_watchlist_add(user_id, symbol, replies).await,
                WatchlistAction::Remove(symbol) => {
                    self.handle_watchlist_remove(user_id, symbol, replies).await
                }
            },
            TelegramCommand::Trade { action, symbol, quantity, price } => {
                self.handle_trade(user_id, *action, symbol, *quantity, *price, replies)
                    .await
            }
            TelegramCommand::Alert { symbol, condition, target } => {
                self.handle_alert(user_id, symbol, *condition, *target, replies).await
            }
            TelegramCommand::RemoveAlert { id } => self.handle_remove_alert(user_id, *id, replies).await,
            TelegramCommand::Chart { symbol, period } => {
                send(replies, format!("📊 Generating chart for {}...", symbol));
                self.handle_chart(symbol, *period, replies).await
            }
            TelegramCommand::Chat { message } => self.handle_chat(user_id, message, replies).await,
        };

        if let Err(e) = result {
            tracing::error!(user_id, command = name, error = %e, "Command failed");
            send(replies, apology(&command));
        }
    }
}

/// Generic failure text per command; internal errors are never shown to users.
fn apology(command: &TelegramCommand) -> &'static str {
    match command {
        TelegramCommand::Price { .. } | TelegramCommand::Market => {
            "Sorry, there was an error fetching the price data."
        }
        TelegramCommand::Analyze { .. } => "Sorry, there was an error analyzing that stock.",
        TelegramCommand::Chart { .. } => "Sorry, there was an error generating the chart.",
        TelegramCommand::Portfolio | TelegramCommand::Trades | TelegramCommand::Trade { .. } => {
            "Sorry, there was an error accessing your portfolio."
        }
        TelegramCommand::Watchlist(_) => "Sorry, there was an error updating your watchlist.",
        TelegramCommand::Alert { .. } | TelegramCommand::Alerts | TelegramCommand::RemoveAlert { .. } => {
            "Sorry, there was an error managing your alerts."
        }
        _ => "Sorry, something went wrong. Please try again.",
    }
}

/// Queue a text reply. A closed channel means the update was abandoned.
pub(crate) fn send(replies: &ReplySender, text: impl Into<String>) {
    let _ = replies.send(Reply::Text(text.into()));
}
