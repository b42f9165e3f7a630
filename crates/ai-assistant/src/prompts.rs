use std::fmt::Write;
use technical_analysis::TechnicalSnapshot;
use tradeai_core::StockQuote;

pub const SYSTEM_PROMPT: &str = "You are TradeAI, a concise trading assistant inside a Telegram chat. \
Answer questions about stocks, markets and trading concepts in plain language. \
Keep replies under 200 words, use short paragraphs or bullet points, \
never promise returns, and remind users that this is not financial advice when recommending actions.";

/// Prompt asking for a structured read on a single ticker.
pub fn analysis_prompt(quote: &StockQuote, technicals: Option<&TechnicalSnapshot>) -> String {
    let mut prompt = format!(
        "Analyze {} ({}) stock:\nCurrent price: ${:.2}\nChange: {:+.2}%\n",
        quote.symbol,
        quote.display_name(),
        quote.price,
        quote.change_percent
    );

    if let Some(volume) = quote.volume {
        let _ = writeln!(prompt, "Volume: {}", volume);
    }
    if let (Some(low), Some(high)) = (quote.day_low, quote.day_high) {
        let _ = writeln!(prompt, "Day range: ${:.2} - ${:.2}", low, high);
    }
    if let (Some(low), Some(high)) = (quote.week52_low, quote.week52_high) {
        let _ = writeln!(prompt, "52-week range: ${:.2} - ${:.2}", low, high);
    }

    if let Some(t) = technicals {
        let _ = writeln!(prompt, "SMA20: ${:.2}", t.sma20);
        if let Some(sma50) = t.sma50 {
            let _ = writeln!(prompt, "SMA50: ${:.2}", sma50);
        }
        if let Some(rsi) = t.rsi14 {
            let _ = writeln!(prompt, "RSI(14): {:.1}", rsi);
        }
        let _ = writeln!(
            prompt,
            "Computed support: ${:.2}, resistance: ${:.2}, technical signal: {}",
            t.support,
            t.resistance,
            t.signal.to_label()
        );
    }

    prompt.push_str(
        "\nProvide a brief analysis including:\n\
         1. Current trend (bullish/bearish)\n\
         2. Key support/resistance levels\n\
         3. Investment recommendation\n\
         4. Risk factors",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_contents() {
        let mut quote = StockQuote::from_prices("NVDA", 825.75, 800.0, "test");
        quote.company_name = Some("NVIDIA Corporation".into());
        quote.day_low = Some(810.0);
        quote.day_high = Some(830.0);

        let prompt = analysis_prompt(&quote, None);
        assert!(prompt.contains("Analyze NVDA (NVIDIA Corporation)"));
        assert!(prompt.contains("$825.75"));
        assert!(prompt.contains("Day range: $810.00 - $830.00"));
        assert!(prompt.contains("Risk factors"));
        assert!(!prompt.contains("RSI"));
    }
}
