pub mod alerts;
pub mod core;
pub mod market;
pub mod trading;

use std::str::FromStr;

use tradeai_core::{normalize_symbol, AlertCondition, ChartPeriod, TradeAction};

/// Slash commands understood by the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum TelegramCommand {
    Start,
    Help,
    Status,
    Market,
    Portfolio,
    Trades,
    Alerts,
    Price { symbol: String },
    Analyze { symbol: String },
    Watchlist(WatchlistAction),
    Trade { action: TradeAction, symbol: String, quantity: f64, price: f64 },
    Alert { symbol: String, condition: AlertCondition, target: f64 },
    RemoveAlert { id: i64 },
    Chart { symbol: String, period: ChartPeriod },
    Chat { message: String },
}

impl TelegramCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Status => "status",
            Self::Market => "market",
            Self::Portfolio => "portfolio",
            Self::Trades => "trades",
            Self::Alerts => "alerts",
            Self::Price { .. } => "price",
            Self::Analyze { .. } => "analyze",
            Self::Watchlist(_) => "watchlist",
            Self::Trade { .. } => "trade",
            Self::Alert { .. } => "alert",
            Self::RemoveAlert { .. } => "remove_alert",
            Self::Chart { .. } => "chart",
            Self::Chat { .. } => "chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistAction {
    Show,
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    NotACommand,
    UnknownCommand(String),
    /// Carries the command name so the reply can show its usage.
    MissingArgument(&'static str),
    InvalidArgument(String),
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotACommand => write!(f, "message is not a command"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command `{cmd}`"),
            Self::MissingArgument(cmd) => write!(f, "missing arguments for `/{cmd}`"),
            Self::InvalidArgument(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommandParseError {}

impl CommandParseError {
    /// Text sent back to the user for a message that did not parse.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotACommand => "Send /help to see what I can do.".to_string(),
            Self::UnknownCommand(cmd) => format!(
                "❓ Unknown command {}. Type /help to see available commands.",
                teloxide::utils::html::escape(cmd)
            ),
            Self::MissingArgument(cmd) => usage(cmd).to_string(),
            Self::InvalidArgument(msg) => format!("❌ {}", teloxide::utils::html::escape(msg)),
        }
    }
}

/// Parse a Telegram message into a bot command.
pub fn parse_command(text: &str) -> Result<TelegramCommand, CommandParseError> {
    let trimmed = text.trim();
    let mut parts = trimmed.split_whitespace();
    let Some(raw_command) = parts.next() else {
        return Err(CommandParseError::NotACommand);
    };
    if !raw_command.starts_with('/') {
        return Err(CommandParseError::NotACommand);
    }

    let command = raw_command
        .split_once('@')
        .map_or(raw_command, |(head, _)| head)
        .to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    match command.as_str() {
        "/start" => Ok(TelegramCommand::Start),
        "/help" => Ok(TelegramCommand::Help),
        "/status" => Ok(TelegramCommand::Status),
        "/market" => Ok(TelegramCommand::Market),
        "/portfolio" => Ok(TelegramCommand::Portfolio),
        "/trades" => Ok(TelegramCommand::Trades),
        "/alerts" => Ok(TelegramCommand::Alerts),
        "/price" => Ok(TelegramCommand::Price {
            symbol: symbol_arg(&args, "price")?,
        }),
        "/analyze" => Ok(TelegramCommand::Analyze {
            symbol: symbol_arg(&args, "analyze")?,
        }),
        "/watchlist" => parse_watchlist(&args),
        "/trade" => parse_trade(&args),
        "/alert" => parse_alert(&args),
        "/remove_alert" => {
            let raw = args.first().ok_or(CommandParseError::MissingArgument("remove_alert"))?;
            let id = raw
                .trim_start_matches('#')
                .parse::<i64>()
                .map_err(|_| CommandParseError::InvalidArgument(format!("Invalid alert ID '{}'", raw)))?;
            Ok(TelegramCommand::RemoveAlert { id })
        }
        "/chart" => {
            let symbol = symbol_arg(&args, "chart")?;
            let period = match args.get(1) {
                Some(raw) => ChartPeriod::from_str(raw).map_err(|_| {
                    CommandParseError::InvalidArgument(format!(
                        "Unknown period '{}'. Use 1W, 1M, 3M, 6M or 1Y",
                        raw
                    ))
                })?,
                None => ChartPeriod::default(),
            };
            Ok(TelegramCommand::Chart { symbol, period })
        }
        "/chat" => {
            let message = trimmed
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");
            if message.is_empty() {
                return Err(CommandParseError::MissingArgument("chat"));
            }
            Ok(TelegramCommand::Chat {
                message: message.to_string(),
            })
        }
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn symbol_arg(args: &[&str], command: &'static str) -> Result<String, CommandParseError> {
    let raw = args.first().ok_or(CommandParseError::MissingArgument(command))?;
    parse_symbol(raw)
}

fn parse_symbol(raw: &str) -> Result<String, CommandParseError> {
    normalize_symbol(raw).map_err(|_| CommandParseError::InvalidArgument(format!("Invalid symbol '{}'", raw)))
}

fn parse_watchlist(args: &[&str]) -> Result<TelegramCommand, CommandParseError> {
    let action = match args.first().map(|a| a.to_ascii_lowercase()) {
        None => WatchlistAction::Show,
        Some(sub) if sub == "add" => {
            let raw = args.get(1).ok_or(CommandParseError::MissingArgument("watchlist"))?;
            WatchlistAction::Add(parse_symbol(raw)?)
        }
        Some(sub) if sub == "remove" => {
            let raw = args.get(1).ok_or(CommandParseError::MissingArgument("watchlist"))?;
            WatchlistAction::Remove(parse_symbol(raw)?)
        }
        Some(_) => return Err(CommandParseError::MissingArgument("watchlist")),
    };
    Ok(TelegramCommand::Watchlist(action))
}

fn positive_number(raw: &str, what: &str) -> Result<f64, CommandParseError> {
    match raw.trim_start_matches('$').replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(CommandParseError::InvalidArgument(format!(
            "{} must be a positive number, got '{}'",
            what, raw
        ))),
    }
}

fn parse_trade(args: &[&str]) -> Result<TelegramCommand, CommandParseError> {
    let [action, symbol, quantity, price] = args else {
        return Err(CommandParseError::MissingArgument("trade"));
    };

    let action = TradeAction::from_str(action).map_err(|_| {
        CommandParseError::InvalidArgument(format!("Action must be 'buy' or 'sell', got '{}'", action))
    })?;

    Ok(TelegramCommand::Trade {
        action,
        symbol: parse_symbol(symbol)?,
        quantity: positive_number(quantity, "Quantity")?,
        price: positive_number(price, "Price")?,
    })
}

fn parse_alert(args: &[&str]) -> Result<TelegramCommand, CommandParseError> {
    let [symbol, condition, target] = args else {
        return Err(CommandParseError::MissingArgument("alert"));
    };

    let symbol = parse_symbol(symbol)?;
    let condition = AlertCondition::from_str(condition).map_err(|_| {
        CommandParseError::InvalidArgument(format!(
            "Unknown condition '{}'. Use above, below or cross",
            condition
        ))
    })?;
    let target = positive_number(target, "Target price")?;

    Ok(TelegramCommand::Alert { symbol, condition, target })
}

/// Usage text for commands invoked without the arguments they need.
pub fn usage(command: &str) -> &'static str {
    match command {
        "price" => "Please provide a stock symbol. Example: /price AAPL",
        "analyze" => "Please provide a stock symbol. Example: /analyze AAPL",
        "chart" => "Please provide a stock symbol. Example: /chart AAPL or /chart TSLA 6M",
        "watchlist" => "Usage:\n/watchlist - show your watchlist\n/watchlist add AAPL\n/watchlist remove AAPL",
        "trade" => "Usage: /trade buy|sell SYMBOL QUANTITY PRICE\nExample: /trade buy AAPL 10 150.25",
        "alert" => "Usage: /alert SYMBOL above|below|cross PRICE\nExample: /alert AAPL above 200",
        "remove_alert" => "Usage: /remove_alert ID\nSee your alert IDs with /alerts",
        "chat" => "Ask me anything. Example: /chat What is a stop loss?",
        _ => "Type /help to see available commands.",
    }
}

/// Bot commands for Telegram menu registration.
///
/// Returns tuples of (command, description) for `set_my_commands`.
pub fn bot_commands() -> Vec<(&'static str, &'static str)> {
    vec![
        ("start", "Welcome message"),
        ("help", "Show all commands"),
        ("status", "Bot status"),
        ("price", "Stock price: /price AAPL"),
        ("analyze", "AI analysis: /analyze AAPL"),
        ("market", "Market overview"),
        ("chart", "Price chart: /chart AAPL 3M"),
        ("portfolio", "Portfolio dashboard"),
        ("watchlist", "Watchlist: /watchlist add AAPL"),
        ("trade", "Record a trade: /trade buy AAPL 10 150"),
        ("trades", "Trade history"),
        ("alert", "Price alert: /alert AAPL above 200"),
        ("alerts", "Active alerts"),
        ("remove_alert", "Remove an alert: /remove_alert 3"),
        ("chat", "Ask the AI assistant"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("/start").unwrap(), TelegramCommand::Start);
        assert_eq!(parse_command("/MARKET").unwrap(), TelegramCommand::Market);
        assert_eq!(parse_command("  /trades  ").unwrap(), TelegramCommand::Trades);
    }

    #[test]
    fn parse_command_with_bot_mention() {
        assert_eq!(
            parse_command("/price@TradeAIBot aapl").unwrap(),
            TelegramCommand::Price { symbol: "AAPL".into() }
        );
    }

    #[test]
    fn parse_missing_and_unknown() {
        assert_eq!(parse_command("/price"), Err(CommandParseError::MissingArgument("price")));
        assert_eq!(parse_command("hello"), Err(CommandParseError::NotACommand));
        assert_eq!(parse_command(""), Err(CommandParseError::NotACommand));
        assert_eq!(
            parse_command("/moon"),
            Err(CommandParseError::UnknownCommand("/moon".into()))
        );
        assert!(CommandParseError::MissingArgument("price")
            .user_message()
            .contains("/price AAPL"));
    }

    #[test]
    fn parse_trade_arguments() {
        assert_eq!(
            parse_command("/trade BUY aapl 10 150.5").unwrap(),
            TelegramCommand::Trade {
                action: TradeAction::Buy,
                symbol: "AAPL".into(),
                quantity: 10.0,
                price: 150.5,
            }
        );
        assert_eq!(parse_command("/trade buy AAPL 10"), Err(CommandParseError::MissingArgument("trade")));
        assert_eq!(
            parse_command("/trade buy AAPL 10 150 extra"),
            Err(CommandParseError::MissingArgument("trade"))
        );
        assert!(matches!(parse_command("/trade hold AAPL 1 1"), Err(CommandParseError::InvalidArgument(_))));
        assert!(matches!(parse_command("/trade buy AAPL -5 150"), Err(CommandParseError::InvalidArgument(_))));
        assert!(matches!(parse_command("/trade buy AAPL 5 NaN"), Err(CommandParseError::InvalidArgument(_))));
    }

    #[test]
    fn parse_alert_arguments() {
        assert_eq!(
            parse_command("/alert tsla cross 250").unwrap(),
            TelegramCommand::Alert {
                symbol: "TSLA".into(),
                condition: AlertCondition::Cross,
                target: 250.0,
            }
        );
        assert_eq!(parse_command("/alert TSLA above"), Err(CommandParseError::MissingArgument("alert")));
        assert_eq!(
            parse_command("/alert TSLA above 250 now"),
            Err(CommandParseError::MissingArgument("alert"))
        );
        assert!(matches!(parse_command("/alert TSLA sideways 1"), Err(CommandParseError::InvalidArgument(_))));
    }

    #[test]
    fn parse_watchlist_variants() {
        assert_eq!(
            parse_command("/watchlist").unwrap(),
            TelegramCommand::Watchlist(WatchlistAction::Show)
        );
        assert_eq!(
            parse_command("/watchlist add nvda").unwrap(),
            TelegramCommand::Watchlist(WatchlistAction::Add("NVDA".into()))
        );
        assert_eq!(
            parse_command("/watchlist REMOVE msft").unwrap(),
            TelegramCommand::Watchlist(WatchlistAction::Remove("MSFT".into()))
        );
        assert_eq!(parse_command("/watchlist add"), Err(CommandParseError::MissingArgument("watchlist")));
        assert_eq!(parse_command("/watchlist clear"), Err(CommandParseError::MissingArgument("watchlist")));
    }

    #[test]
    fn parse_chart_remove_alert_and_chat() {
        assert_eq!(
            parse_command("/chart AAPL").unwrap(),
            TelegramCommand::Chart { symbol: "AAPL".into(), period: ChartPeriod::OneMonth }
        );
        assert_eq!(
            parse_command("/chart AAPL 6m").unwrap(),
            TelegramCommand::Chart { symbol: "AAPL".into(), period: ChartPeriod::SixMonths }
        );
        let err = parse_command("/chart AAPL 2D").unwrap_err();
        assert!(err.user_message().contains("Unknown period '2D'"));

        assert_eq!(parse_command("/remove_alert #12").unwrap(), TelegramCommand::RemoveAlert { id: 12 });
        assert!(matches!(parse_command("/remove_alert abc"), Err(CommandParseError::InvalidArgument(_))));

        assert_eq!(
            parse_command("/chat  what is   a stop loss? ").unwrap(),
            TelegramCommand::Chat { message: "what is   a stop loss?".into() }
        );
        assert_eq!(parse_command("/chat"), Err(CommandParseError::MissingArgument("chat")));
    }

    #[test]
    fn bot_commands_cover_parser() {
        for (name, _) in bot_commands() {
            let err = parse_command(&format!("/{}", name)).err();
            assert!(!matches!(err, Some(CommandParseError::UnknownCommand(_))), "{} is not parsed", name);
        }
    }
}
