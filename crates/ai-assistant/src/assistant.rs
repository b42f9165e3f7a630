use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use technical_analysis::TechnicalSnapshot;
use tradeai_core::{Assistant, BotError, ChatRole, ChatTurn, StockQuote};

use crate::prompts::{analysis_prompt, SYSTEM_PROMPT};

/// Conversation turns (user + assistant pairs) remembered per user.
pub const HISTORY_TURNS: usize = 10;

const OFFLINE_REPLY: &str = "🤖 I'm running in simplified mode right now, so I can't chat freely.\n\n\
I can still help with:\n\
• Stock prices: /price AAPL\n\
• Charts: /chart TSLA\n\
• Analysis: /analyze NVDA\n\
• Portfolio: /portfolio\n\n\
Type /help for all commands!";

/// Deterministic stand-in used when no language model is reachable.
pub struct OfflineAssistant;

#[async_trait]
impl Assistant for OfflineAssistant {
    fn name(&self) -> &str {
        "Offline"
    }

    async fn complete(&self, _messages: &[ChatTurn]) -> Result<String, BotError> {
        Ok(OFFLINE_REPLY.to_string())
    }
}

/// Trading-focused chat on top of an [`Assistant`] backend, with per-user memory.
pub struct TradingAssistant {
    backend: Arc<dyn Assistant>,
    history: DashMap<i64, VecDeque<ChatTurn>>,
}

impl TradingAssistant {
    pub fn new(backend: Arc<dyn Assistant>) -> Self {
        Self {
            backend,
            history: DashMap::new(),
        }
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineAssistant))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_online(&self) -> bool {
        self.backend.name() != "Offline"
    }

    /// Free-form trading advice; falls back to the offline reply if the backend fails.
    pub async fn advise(&self, user_id: i64, message: &str) -> String {
        let mut messages = vec![ChatTurn::new(ChatRole::System, SYSTEM_PROMPT)];
        if let Some(past) = self.history.get(&user_id) {
            messages.extend(past.iter().cloned());
        }
        messages.push(ChatTurn::new(ChatRole::User, message));

        match self.backend.complete(&messages).await {
            Ok(reply) => {
                self.remember(user_id, message, &reply);
                reply
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, backend = self.backend.name(), "assistant unavailable, using offline reply");
                OFFLINE_REPLY.to_string()
            }
        }
    }

    /// Narrative analysis for `/analyze`. Without a model, summarizes the indicators instead.
    pub async fn analyze(&self, quote: &StockQuote, technicals: Option<&TechnicalSnapshot>) -> String {
        if !self.is_online() {
            return rule_based_analysis(quote, technicals);
        }

        let messages = vec![
            ChatTurn::new(ChatRole::System, SYSTEM_PROMPT),
            ChatTurn::new(ChatRole::User, analysis_prompt(quote, technicals)),
        ];

        match self.backend.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(symbol = %quote.symbol, error = %e, "AI analysis unavailable, using indicator summary");
                rule_based_analysis(quote, technicals)
            }
        }
    }

    pub fn clear_history(&self, user_id: i64) {
        self.history.remove(&user_id);
    }

    pub fn history_len(&self, user_id: i64) -> usize {
        self.history.get(&user_id).map(|h| h.len()).unwrap_or(0)
    }

    fn remember(&self, user_id: i64, question: &str, answer: &str) {
        let mut entry = self.history.entry(user_id).or_default();
        entry.push_back(ChatTurn::new(ChatRole::User, question));
        entry.push_back(ChatTurn::new(ChatRole::Assistant, answer));
        while entry.len() > HISTORY_TURNS * 2 {
            entry.pop_front();
        }
    }
}

fn rule_based_analysis(quote: &StockQuote, technicals: Option<&TechnicalSnapshot>) -> String {
    let Some(t) = technicals else {
        return format!(
            "AI analysis is not available right now.\n\n{} is trading at ${:.2} ({:+.2}% today). \
             Not enough price history to compute indicators.",
            quote.symbol, quote.price, quote.change_percent
        );
    };

    let rsi_line = match t.rsi14 {
        Some(rsi) => format!("RSI(14) is {:.1} ({}).", rsi, t.rsi_zone()),
        None => "RSI unavailable.".to_string(),
    };

    format!(
        "AI analysis is not available right now; indicator summary:\n\n\
         • Trend: {}\n\
         • {}\n\
         • Support ${:.2} / resistance ${:.2}\n\
         • Technical signal: {}\n\n\
         ⚠️ Indicators only. Not financial advice.",
        t.trend.label(),
        rsi_line,
        t.support,
        t.resistance,
        t.signal.to_label()
    )
}
