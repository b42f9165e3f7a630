use tradeai_core::SERVICE_VERSION;

use crate::handler::{send, Handler, HandlerResult, ReplySender};
use crate::messages::{self, clip_text, MAX_MESSAGE_CHARS};
use crate::status::format_uptime;

impl Handler {
    pub(crate) async fn handle_start(&self, replies: &ReplySender) -> HandlerResult {
        send(replies, messages::WELCOME);
        Ok(())
    }

    pub(crate) async fn handle_help(&self, replies: &ReplySender) -> HandlerResult {
        send(replies, messages::HELP);
        Ok(())
    }

    pub(crate) async fn handle_status(&self, replies: &ReplySender) -> HandlerResult {
        let mut msg = String::from("🤖 <b>TradeAI Bot Status</b>\n\n");
        msg.push_str("✅ <b>Online</b>\n");
        msg.push_str(&format!("⏱️ Uptime: {}\n", format_uptime(self.status.uptime_secs())));
        msg.push_str(&format!("🔖 Version: {}\n\n", SERVICE_VERSION));

        msg.push_str("<b>Services</b>\n");
        msg.push_str(&format!(
            "🧠 AI: {}\n",
            if self.assistant.is_online() { "OpenAI" } else { "Offline mode" }
        ));

        let providers = self
            .market
            .provider_status()
            .iter()
            .map(|p| {
                if p.circuit_open {
                    format!("{} ⚠️", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        msg.push_str(&format!("📡 Market data: {}\n", providers));
        msg.push_str(&format!(
            "🗄️ Database: {}\n",
            if self.database_persistent { "SQLite (persistent)" } else { "In-memory" }
        ));
        msg.push_str(&format!(
            "📊 Charts: {}\n",
            if self.charts.uses_chart_img() { "chart-img.com" } else { "Local rendering" }
        ));

        match self.status.monitor_stats().await {
            Some(stats) => msg.push_str(&format!(
                "🔔 Alert monitor: {} cycles, {} alerts triggered ({:.0}% healthy)\n",
                stats.cycles_run,
                stats.alerts_triggered,
                stats.success_rate()
            )),
            None => msg.push_str("🔔 Alert monitor: not running\n"),
        }

        send(replies, msg);
        Ok(())
    }

    pub(crate) async fn handle_chat(&self, user_id: i64, message: &str, replies: &ReplySender) -> HandlerResult {
        let answer = self.assistant.advise(user_id, message).await;
        send(replies, teloxide::utils::html::escape(&clip_text(&answer, MAX_MESSAGE_CHARS)));
        Ok(())
    }

    /// Messages that are not commands: keyword hints first, then the AI assistant.
    pub(crate) async fn handle_free_text(&self, user_id: i64, text: &str, replies: &ReplySender) -> HandlerResult {
        let lower = text.to_lowercase();

        if lower.contains("price") {
            send(replies, messages::PRICE_HINT);
        } else if lower.contains("chart") {
            send(replies, messages::CHART_HINT);
        } else if lower.contains("help") {
            send(replies, messages::HELP);
        } else if is_greeting(&lower) {
            send(replies, messages::GREETING);
        } else {
            self.handle_chat(user_id, text, replies).await?;
        }
        Ok(())
    }
}

fn is_greeting(lower: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| matches!(word, "hello" | "hi" | "hey"))
}
