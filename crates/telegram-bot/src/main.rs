use std::sync::Arc;

use ai_assistant::{OpenAiClient, OpenAiConfig, TradingAssistant};
use alert_monitor::{AlertMonitor, MonitorConfig};
use anyhow::Context;
use market_data::MarketDataService;
use portfolio_manager::{AlertManager, PortfolioDb};
use telegram_bot::commands::bot_commands;
use telegram_bot::{
    health, BotConfig, BotStatus, ChartService, Handler, LogSettings, RateLimiter, Reply,
    TelegramNotifier,
};
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction, InputFile, ParseMode};
use tokio::signal::unix::SignalKind;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradeai_core::{QuoteProvider, SERVICE_NAME, SERVICE_VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_settings = LogSettings::from_env();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_settings.default_filter.clone().into());

    if log_settings.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        service = SERVICE_NAME,
        version = SERVICE_VERSION,
        deployment_mode = %config.deployment_mode,
        port = config.port,
        "Starting"
    );

    let db = PortfolioDb::from_env().await.context("failed to open the portfolio database")?;
    let market = Arc::new(MarketDataService::from_env().context("failed to configure market data")?);
    let openai = OpenAiClient::new(OpenAiConfig::new(config.openai_api_key.clone()))
        .context("failed to configure OpenAI")?;
    let assistant = Arc::new(TradingAssistant::new(Arc::new(openai)));

    let bot = Bot::new(&config.telegram_token);

    let quotes: Arc<dyn QuoteProvider> = market.clone();
    let monitor = AlertMonitor::new(
        AlertManager::new(db.clone()),
        quotes,
        Arc::new(TelegramNotifier::new(bot.clone())),
        MonitorConfig::from_env()?,
    );
    let status = Arc::new(BotStatus::new(Some(monitor.stats_handle())));

    let handler = Arc::new(Handler::new(
        market,
        assistant,
        db,
        ChartService::new(config.chart_img_api_key.clone()),
        RateLimiter::new(config.rate_limit_commands),
        status.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_task = tokio::spawn(health::serve(config.port, status.clone(), shutdown_rx.clone()));
    let monitor_task = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    if let Err(e) = register_bot_commands(&bot).await {
        tracing::warn!(error = %e, "Failed to register bot commands with Telegram");
    }

    let mut dispatcher = Dispatcher::builder(bot, Update::filter_message().endpoint(handle_update))
        .dependencies(dptree::deps![handler])
        .default_handler(|_| async {})
        .build();
    let dispatcher_shutdown = dispatcher.shutdown_token();
    let mut dispatch_task = tokio::spawn(async move { dispatcher.dispatch().await });

    status.set_ready();
    tracing::info!("Telegram bot polling for updates");

    // Graceful shutdown: SIGINT + SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        result = &mut dispatch_task => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Telegram dispatcher stopped unexpectedly");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    if let Ok(stopping) = dispatcher_shutdown.shutdown() {
        stopping.await;
    }
    let _ = shutdown_tx.send(true);

    if let Ok(Err(e)) = health_task.await {
        tracing::error!(error = %e, "Health server failed");
    }
    let _ = monitor_task.await;

    tracing::info!("TradeAI bot shut down.");
    Ok(())
}

async fn register_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    let commands: Vec<BotCommand> = bot_commands()
        .into_iter()
        .map(|(cmd, desc)| BotCommand::new(cmd, desc))
        .collect();

    bot.set_my_commands(commands).await?;
    tracing::info!("Registered bot commands with Telegram");
    Ok(())
}

async fn handle_update(bot: Bot, msg: Message, handler: Arc<Handler>) -> ResponseResult<()> {
    let Some(text) = msg.text().map(str::to_owned) else {
        return respond(());
    };

    let chat_id = msg.chat.id;
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(chat_id.0);

    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        tracing::debug!(error = %e, "typing indicator failed");
    }

    // Replies stream out while slow commands (AI, charts) are still running.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let produce = async move {
        handler.handle_message(user_id, &text, &tx).await;
    };
    let forward = async {
        while let Some(reply) = rx.recv().await {
            deliver(&bot, chat_id, reply).await;
        }
    };
    tokio::join!(produce, forward);

    respond(())
}

async fn deliver(bot: &Bot, chat_id: ChatId, reply: Reply) {
    let result = match reply {
        Reply::Text(text) => bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ()),
        Reply::Photo { bytes, caption } => bot
            .send_photo(chat_id, InputFile::memory(bytes).file_name("chart.png"))
            .caption(caption)
            .await
            .map(|_| ()),
    };

    if let Err(e) = result {
        tracing::error!(chat_id = chat_id.0, error = %e, "Failed to send reply");
    }
}
