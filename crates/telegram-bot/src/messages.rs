//! HTML reply formatting. Every dynamic string is escaped before it reaches Telegram.

use chrono::{DateTime, Utc};
use portfolio_manager::{PortfolioSummary, PriceAlert, Trade, TradeStats};
use technical_analysis::TechnicalSnapshot;
use teloxide::utils::html::escape;
use tradeai_core::{BotError, MarketClock, MarketSummary, PriceDirection, StockQuote};

/// Telegram rejects messages over 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Room left for the AI insight inside an `/analyze` reply.
const MAX_INSIGHT_CHARS: usize = 3000;

pub const WELCOME: &str = "🤖 <b>Welcome to TradeAI Bot!</b>\n\n\
I'm your AI-powered trading assistant.\n\n\
📊 <b>Market Data</b>\n\
• /price AAPL - Real-time stock prices\n\
• /market - Market overview\n\
• /chart TSLA - Price charts\n\
• /analyze NVDA - AI analysis\n\n\
💼 <b>Portfolio</b>\n\
• /trade buy AAPL 10 150 - Record a trade\n\
• /portfolio - Your holdings\n\
• /watchlist - Your watchlist\n\n\
🔔 <b>Alerts</b>\n\
• /alert AAPL above 150 - Set a price alert\n\n\
Type /help to see every command.";

pub const HELP: &str = "📚 <b>TradeAI Commands</b>\n\n\
<b>📊 Market Data</b>\n\
• /price AAPL - Stock price and daily range\n\
• /analyze AAPL - Technical + AI analysis\n\
• /market - Major indices and sentiment\n\
• /chart AAPL 6M - Price chart (1W, 1M, 3M, 6M, 1Y)\n\n\
<b>💼 Portfolio Tracking</b>\n\
• /trade buy AAPL 10 150 - Record a buy\n\
• /trade sell TSLA 5 250 - Record a sell\n\
• /trades - Trade history\n\
• /portfolio - Portfolio dashboard\n\
• /watchlist - Watchlist with live prices\n\
• /watchlist add AAPL - Add to watchlist\n\
• /watchlist remove AAPL - Remove from watchlist\n\n\
<b>🔔 Price Alerts</b>\n\
• /alert AAPL above 150 - Notify above a price\n\
• /alert TSLA below 200 - Notify below a price\n\
• /alert NVDA cross 500 - Notify when price crosses\n\
• /alerts - Your active alerts\n\
• /remove_alert 12 - Delete an alert\n\n\
<b>💬 AI Assistant</b>\n\
• /chat How do stop losses work?\n\
• Or just send a message\n\n\
<b>ℹ️ Bot</b>\n\
• /status - Bot status\n\
• /help - This message";

pub const PRICE_HINT: &str = "To get stock prices, use:\n/price AAPL\n/price TSLA";
pub const CHART_HINT: &str = "To view charts, use:\n/chart AAPL\n/chart TSLA 6M";
pub const GREETING: &str = "Hello! 👋 I'm your TradeAI assistant. Type /help to see what I can do!";

/// Shorten plain text (before escaping) to at most `max_chars` characters.
pub fn clip_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
    }
}

/// Drop whole trailing lines of a formatted reply until it fits.
///
/// Formatted lines always close their own tags, so cutting between lines keeps
/// the HTML valid.
pub fn fit_message(html: &str) -> String {
    if visible_len(html) <= MAX_MESSAGE_CHARS {
        return html.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for line in html.split_inclusive('\n') {
        let len = visible_len(line);
        if used + len > MAX_MESSAGE_CHARS {
            break;
        }
        out.push_str(line);
        used += len;
    }
    out.push('…');
    out
}

/// Length Telegram counts once the HTML is parsed: tags are dropped and each entity is one character.
fn visible_len(html: &str) -> usize {
    let mut count = 0;
    let (mut in_tag, mut in_entity) = (false, false);
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '&' => {
                in_entity = true;
                count += 1;
            }
            ';' if in_entity => in_entity = false,
            _ if in_entity => {}
            _ => count += 1,
        }
    }
    count
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, frac) = match formatted.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// `$1,234.56`
pub fn format_money(value: f64) -> String {
    let grouped = group_thousands(value, 2);
    match grouped.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None => format!("${}", grouped),
    }
}

/// `+$12.00` / `-$3.50`
pub fn format_signed_money(value: f64) -> String {
    if value >= 0.0 {
        format!("+{}", format_money(value))
    } else {
        format_money(value)
    }
}

pub fn format_volume(v: f64) -> String {
    if v >= 1_000_000_000.0 {
        format!("{:.1}B", v / 1_000_000_000.0)
    } else if v >= 1_000_000.0 {
        format!("{:.1}M", v / 1_000_000.0)
    } else if v >= 1_000.0 {
        format!("{:.1}K", v / 1_000.0)
    } else {
        format!("{:.0}", v)
    }
}

pub fn format_market_cap(v: f64) -> String {
    if v >= 1_000_000_000_000.0 {
        format!("${:.2}T", v / 1_000_000_000_000.0)
    } else if v >= 1_000_000_000.0 {
        format!("${:.2}B", v / 1_000_000_000.0)
    } else if v >= 1_000_000.0 {
        format!("${:.2}M", v / 1_000_000.0)
    } else {
        format_money(v)
    }
}

/// Share counts: whole numbers without decimals, fractions trimmed.
pub fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{:.0}", q)
    } else {
        let s = format!("{:.4}", q);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn direction_emoji(change_percent: f64) -> &'static str {
    PriceDirection::from_change(change_percent).emoji()
}

pub fn format_quote(quote: &StockQuote) -> String {
    let symbol = escape(&quote.symbol);
    let mut msg = match &quote.company_name {
        Some(name) => format!("💰 <b>{} - {}</b>\n\n", symbol, escape(name)),
        None => format!("💰 <b>{}</b>\n\n", symbol),
    };

    msg.push_str(&format!("<b>Price:</b> {}\n", format_money(quote.price)));
    msg.push_str(&format!(
        "<b>Change:</b> {} {:+.2} ({:+.2}%)\n",
        quote.direction().emoji(),
        quote.change,
        quote.change_percent
    ));
    if let Some(volume) = quote.volume {
        msg.push_str(&format!("<b>Volume:</b> {}\n", format_volume(volume as f64)));
    }
    if let (Some(low), Some(high)) = (quote.day_low, quote.day_high) {
        msg.push_str(&format!(
            "<b>Day Range:</b> {} - {}\n",
            format_money(low),
            format_money(high)
        ));
    }
    if let (Some(low), Some(high)) = (quote.week52_low, quote.week52_high) {
        msg.push_str(&format!(
            "<b>52W Range:</b> {} - {}\n",
            format_money(low),
            format_money(high)
        ));
    }
    if let Some(cap) = quote.market_cap {
        msg.push_str(&format!("<b>Market Cap:</b> {}\n", format_market_cap(cap)));
    }
    if let Some(pe) = quote.pe_ratio {
        msg.push_str(&format!("<b>P/E:</b> {:.1}\n", pe));
    }

    msg.push_str(&format!(
        "\n<i>Data from {} • {}</i>",
        escape(&quote.source),
        format_time(&quote.timestamp)
    ));
    if quote.is_demo {
        msg.push_str("\n⚠️ <i>Demo data: live market providers are unavailable.</i>");
    }
    msg
}

pub fn format_analysis(quote: &StockQuote, technicals: Option<&TechnicalSnapshot>, insight: &str) -> String {
    let mut msg = format!("🤖 <b>AI Analysis for {}</b>\n\n", escape(&quote.symbol));

    msg.push_str(&format!(
        "💰 Price: {} ({} {:+.2}%)\n",
        format_money(quote.price),
        quote.direction().emoji(),
        quote.change_percent
    ));

    if let Some(t) = technicals {
        msg.push_str(&format!(
            "📈 Trend: {} | Signal: {}\n",
            t.trend.label(),
            t.signal.to_label()
        ));
        let mut averages = format!("📊 SMA20: {}", format_money(t.sma20));
        if let Some(sma50) = t.sma50 {
            averages.push_str(&format!(" | SMA50: {}", format_money(sma50)));
        }
        if let Some(rsi) = t.rsi14 {
            averages.push_str(&format!(" | RSI(14): {:.1} ({})", rsi, t.rsi_zone()));
        }
        msg.push_str(&averages);
        msg.push('\n');
        msg.push_str(&format!(
            "🛡️ Support: {} | 🎯 Resistance: {}\n",
            format_money(t.support),
            format_money(t.resistance)
        ));
    }

    msg.push_str(&format!("\n{}\n\n", escape(&clip_text(insight.trim(), MAX_INSIGHT_CHARS))));
    msg.push_str("<i>Analysis based on current market data</i>");
    if quote.is_demo {
        msg.push_str("\n⚠️ <i>Demo data: live market providers are unavailable.</i>");
    }
    msg
}

pub fn format_market(summary: &MarketSummary, clock: Option<&MarketClock>) -> String {
    let mut msg = String::from("🌍 <b>Market Overview</b>\n\n");

    for index in &summary.indices {
        msg.push_str(&format!(
            "{} <b>{}</b>: {} ({:+.2}%)\n",
            direction_emoji(index.change_percent),
            escape(&index.name),
            group_thousands(index.value, 2),
            index.change_percent
        ));
    }

    msg.push_str(&format!("\n<b>Sentiment:</b> {}\n", summary.sentiment.label()));

    if let Some(clock) = clock {
        if clock.is_open {
            msg.push_str("🔔 Market is <b>OPEN</b>");
            if let Some(close) = clock.next_close {
                msg.push_str(&format!(" (closes {})", format_time(&close)));
            }
        } else {
            msg.push_str("🌙 Market is <b>CLOSED</b>");
            if let Some(open) = clock.next_open {
                msg.push_str(&format!(" (opens {})", format_time(&open)));
            }
        }
        msg.push('\n');
    }

    msg.push_str(&format!("\n<i>Updated {}</i>", format_time(&summary.timestamp)));
    if summary.is_demo() {
        msg.push_str("\n⚠️ <i>Some values are demo data.</i>");
    }
    msg
}

/// Watchlist dashboard: live moves sorted by change, plus up/down/flat counts.
pub fn format_watchlist(entries: &[(String, Result<StockQuote, BotError>)]) -> String {
    if entries.is_empty() {
        return "📋 <b>Your Watchlist</b>\n\nYour watchlist is empty.\n\nAdd stocks with: /watchlist add AAPL".to_string();
    }

    let mut quotes: Vec<&StockQuote> = entries.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
    quotes.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));

    let mut msg = format!("📋 <b>Your Watchlist</b> ({} stocks)\n\n", entries.len());

    let (mut up, mut down, mut flat) = (0, 0, 0);
    for quote in &quotes {
        match quote.direction() {
            PriceDirection::Up => up += 1,
            PriceDirection::Down => down += 1,
            PriceDirection::Flat => flat += 1,
        }
        msg.push_str(&format!(
            "{} <b>{}</b> {} ({:+.2}%)\n",
            quote.direction().emoji(),
            escape(&quote.symbol),
            format_money(quote.price),
            quote.change_percent
        ));
    }

    for (symbol, result) in entries {
        if result.is_err() {
            msg.push_str(&format!("❓ <b>{}</b> price unavailable\n", escape(symbol)));
        }
    }

    if !quotes.is_empty() {
        let avg = quotes.iter().map(|q| q.change_percent).sum::<f64>() / quotes.len() as f64;
        msg.push_str(&format!(
            "\n📊 Up: {} | Down: {} | Flat: {}\nAverage change: {:+.2}%",
            up, down, flat, avg
        ));
    }
    msg
}

pub const EMPTY_PORTFOLIO: &str = "💼 <b>Your Portfolio</b>\n\nYour portfolio is empty.\n\n\
Start tracking trades with:\n/trade buy AAPL 10 150";

pub fn format_portfolio(summary: &PortfolioSummary) -> String {
    if summary.is_empty() {
        return EMPTY_PORTFOLIO.to_string();
    }

    let mut msg = String::from("💼 <b>Your Portfolio</b>\n\n💰 <b>Summary</b>\n");
    msg.push_str(&format!("Total Value: {}\n", format_money(summary.total_value)));
    msg.push_str(&format!("Cost Basis: {}\n", format_money(summary.total_cost)));
    msg.push_str(&format!(
        "P&amp;L: {} {} ({:+.2}%)\n",
        direction_emoji(summary.total_pnl_percent),
        format_signed_money(summary.total_pnl),
        summary.total_pnl_percent
    ));
    msg.push_str(&format!("Today: {:+.2}%\n", summary.day_change_percent));

    msg.push_str("\n📊 <b>Holdings</b>\n");
    for p in &summary.positions {
        msg.push_str(&format!(
            "<b>{}</b> {} @ {} → {}\n",
            escape(&p.symbol),
            format_quantity(p.quantity),
            format_money(p.avg_price),
            format_money(p.current_price)
        ));
        msg.push_str(&format!(
            "  Value {} ({:.1}%) | P&amp;L {} ({:+.2}%)\n",
            format_money(p.market_value),
            p.allocation_percent,
            format_signed_money(p.unrealized_pnl),
            p.unrealized_pnl_percent
        ));
        if !p.priced {
            msg.push_str("  <i>quote unavailable, valued at cost</i>\n");
        }
    }

    msg.push_str("\n🏆 <b>Performance</b>\n");
    msg.push_str(&format!("Winners: {} | Losers: {}\n", summary.winners(), summary.losers()));
    if let Some(largest) = summary.largest_position() {
        msg.push_str(&format!(
            "Largest: {} ({:.1}%)\n",
            escape(&largest.symbol),
            largest.allocation_percent
        ));
    }
    if summary.positions.len() > 1 {
        if let Some(smallest) = summary.smallest_position() {
            msg.push_str(&format!(
                "Smallest: {} ({:.1}%)\n",
                escape(&smallest.symbol),
                smallest.allocation_percent
            ));
        }
    }

    if !summary.recent_trades.is_empty() {
        msg.push_str("\n🕒 <b>Recent Activity</b>\n");
        for trade in &summary.recent_trades {
            msg.push_str(&format!("{}\n", trade_line(trade)));
        }
    }
    msg
}

fn trade_line(trade: &Trade) -> String {
    format!(
        "{} {} {} {} @ {}",
        if trade.is_buy() { "🟢" } else { "🔴" },
        trade.action.to_uppercase(),
        format_quantity(trade.quantity),
        escape(&trade.symbol),
        format_money(trade.price)
    )
}

pub fn format_trade_recorded(trade: &Trade) -> String {
    format!(
        "{} <b>Trade Recorded!</b>\n\n\
         <b>Action:</b> {}\n\
         <b>Symbol:</b> {}\n\
         <b>Quantity:</b> {}\n\
         <b>Price:</b> {}\n\
         <b>Total:</b> {}\n\
         <b>Trade ID:</b> #{}",
        if trade.is_buy() { "🟢" } else { "🔴" },
        trade.action.to_uppercase(),
        escape(&trade.symbol),
        format_quantity(trade.quantity),
        format_money(trade.price),
        format_money(trade.total()),
        trade.id
    )
}

pub fn format_trades(stats: &TradeStats, trades: &[Trade]) -> String {
    if trades.is_empty() {
        return "📊 <b>Trade History</b>\n\nNo trades recorded yet.\n\nStart tracking with:\n/trade buy AAPL 10 150".to_string();
    }

    let mut msg = String::from("📊 <b>Trade History</b>\n\n");
    msg.push_str(&format!(
        "<b>Stats:</b> {} trades ({} buys, {} sells)\nVolume: {} | Symbols: {}\n\n",
        stats.total_trades,
        stats.buys,
        stats.sells,
        format_money(stats.total_volume),
        stats.unique_symbols
    ));

    for trade in trades {
        msg.push_str(&format!(
            "<b>#{}</b> {} = {}\n   {}\n",
            trade.id,
            trade_line(trade),
            format_money(trade.total()),
            format_time(&trade.executed_at)
        ));
    }

    msg.push_str(&format!(
        "\n<i>Showing last {} of {} trades</i>",
        trades.len(),
        stats.total_trades
    ));
    msg
}

fn condition_phrase(alert: &PriceAlert) -> String {
    let verb = match alert.condition_type.as_str() {
        "above" => "goes above",
        "below" => "goes below",
        _ => "crosses",
    };
    format!("{} {}", verb, format_money(alert.target_price))
}

pub fn format_alert_created(alert: &PriceAlert) -> String {
    let mut msg = format!(
        "✅ <b>Alert Set!</b>\n\nI'll notify you when <b>{}</b> {}.\n",
        escape(&alert.symbol),
        condition_phrase(alert)
    );
    if let Some(reference) = alert.reference_price {
        msg.push_str(&format!("Current price: {}\n", format_money(reference)));
    }
    msg.push_str(&format!("Alert ID: #{}", alert.id));
    msg
}

pub fn format_alerts(alerts: &[PriceAlert]) -> String {
    if alerts.is_empty() {
        return "🔔 <b>Your Alerts</b>\n\nYou have no active alerts.\n\nCreate one with: /alert AAPL above 150".to_string();
    }

    let mut msg = format!("🔔 <b>Your Active Alerts</b> ({})\n\n", alerts.len());
    for alert in alerts {
        msg.push_str(&format!(
            "#{} <b>{}</b> {} (set {})\n",
            alert.id,
            escape(&alert.symbol),
            condition_phrase(alert),
            alert.created_at.format("%Y-%m-%d")
        ));
    }
    msg.push_str("\nRemove one with /remove_alert ID");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_manager::PositionValue;

    #[test]
    fn test_money_formatting() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(1234.5), "$1,234.50");
        assert_eq!(format_money(999.999), "$1,000.00");
        assert_eq!(format_money(-1234567.891), "-$1,234,567.89");
        assert_eq!(format_signed_money(12.0), "+$12.00");
        assert_eq!(format_signed_money(-3.5), "-$3.50");
        assert_eq!(format_money(-0.001), "$0.00");
    }

    #[test]
    fn test_compact_numbers() {
        assert_eq!(format_volume(52_300_000.0), "52.3M");
        assert_eq!(format_volume(950.0), "950");
        assert_eq!(format_market_cap(2_950_000_000_000.0), "$2.95T");
        assert_eq!(format_market_cap(45_000_000_000.0), "$45.00B");
        assert_eq!(format_quantity(10.0), "10");
        assert_eq!(format_quantity(0.25), "0.25");
    }

    #[test]
    fn test_clip_text() {
        assert_eq!(clip_text("hello", 10), "hello");
        assert_eq!(clip_text("hello world", 6), "hello…");
        assert_eq!(clip_text(&"é".repeat(20), 5), "ééééé…");
    }

    #[test]
    fn test_visible_len_ignores_markup() {
        assert_eq!(visible_len("<b>R&amp;D</b>"), 3);
        assert_eq!(visible_len("plain"), 5);
    }

    #[test]
    fn test_fit_message_cuts_between_lines() {
        assert_eq!(fit_message("<b>short</b>"), "<b>short</b>");

        let line = "<b>R&amp;D</b> spending up 12%\n";
        let html = line.repeat(400);
        let fitted = fit_message(&html);

        assert!(fitted.ends_with("\n…"));
        assert!(visible_len(&fitted) <= MAX_MESSAGE_CHARS + 1);
        assert_eq!(fitted.matches("<b>").count(), fitted.matches("</b>").count());
        assert_eq!(fitted.matches("&amp;").count(), fitted.matches("R&").count());
        assert!(fitted.trim_end_matches('…').split_inclusive('\n').all(|l| l == line));
    }

    #[test]
    fn test_long_insight_keeps_valid_html() {
        let quote = StockQuote::from_prices("AAPL", 190.0, 185.0, "Yahoo Finance");
        let insight = "R&D ".repeat(900);
        let msg = format_analysis(&quote, None, &insight);

        assert!(visible_len(&msg) <= MAX_MESSAGE_CHARS);
        assert_eq!(fit_message(&msg), msg);
        assert!(msg.contains("R&amp;D…"));
        assert!(!msg.contains("&am\n"));
        assert!(msg.ends_with("<i>Analysis based on current market data</i>"));
    }

    #[test]
    fn test_quote_escapes_company_name() {
        let mut quote = StockQuote::from_prices("AT&T", 17.0, 16.5, "Yahoo Finance");
        quote.company_name = Some("AT&T <Inc>".into());
        let msg = format_quote(&quote);
        assert!(msg.contains("AT&amp;T &lt;Inc&gt;"));
        assert!(msg.contains("$17.00"));
        assert!(!msg.contains("Demo data"));
    }

    #[test]
    fn test_watchlist_sorted_with_counts() {
        let mut up = StockQuote::from_prices("NVDA", 110.0, 100.0, "t");
        up.change_percent = 10.0;
        let down = StockQuote::from_prices("TSLA", 95.0, 100.0, "t");
        let flat = StockQuote::from_prices("KO", 60.0, 60.0, "t");
        let entries = vec![
            ("TSLA".to_string(), Ok(down)),
            ("KO".to_string(), Ok(flat)),
            ("NVDA".to_string(), Ok(up)),
            ("ZZZ".to_string(), Err(BotError::NotFound("ZZZ".into()))),
        ];

        let msg = format_watchlist(&entries);
        let nvda = msg.find("NVDA").unwrap();
        let ko = msg.find("KO").unwrap();
        let tsla = msg.find("TSLA").unwrap();
        assert!(nvda < ko && ko < tsla);
        assert!(msg.contains("Up: 1 | Down: 1 | Flat: 1"));
        assert!(msg.contains("ZZZ</b> price unavailable"));
    }

    #[test]
    fn test_portfolio_dashboard() {
        let summary = PortfolioSummary {
            positions: vec![PositionValue {
                symbol: "AAPL".into(),
                quantity: 10.0,
                avg_price: 150.0,
                current_price: 180.0,
                market_value: 1800.0,
                cost_basis: 1500.0,
                unrealized_pnl: 300.0,
                unrealized_pnl_percent: 20.0,
                allocation_percent: 100.0,
                day_change_percent: 1.5,
                priced: true,
            }],
            total_value: 1800.0,
            total_cost: 1500.0,
            total_pnl: 300.0,
            total_pnl_percent: 20.0,
            day_change_percent: 1.5,
            recent_trades: vec![],
        };

        let msg = format_portfolio(&summary);
        assert!(msg.contains("Total Value: $1,800.00"));
        assert!(msg.contains("+$300.00 (+20.00%)"));
        assert!(msg.contains("Winners: 1 | Losers: 0"));
        assert!(msg.contains("Largest: AAPL (100.0%)"));
        assert!(!msg.contains("Smallest"));
    }
}
