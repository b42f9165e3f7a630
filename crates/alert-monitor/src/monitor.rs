use crate::config::MonitorConfig;
use crate::metrics::{CycleReport, MonitorStats};
use futures::future::join_all;
use portfolio_manager::{AlertManager, PortfolioResult, PriceAlert};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tradeai_core::{AlertCondition, AlertNotifier, BotError, QuoteProvider};

/// Emit a metrics summary every N cycles.
const METRICS_LOG_INTERVAL: u64 = 10;

pub struct AlertMonitor {
    alerts: AlertManager,
    quotes: Arc<dyn QuoteProvider>,
    notifier: Arc<dyn AlertNotifier>,
    config: MonitorConfig,
    stats: Arc<RwLock<MonitorStats>>,
}

impl AlertMonitor {
    pub fn new(
        alerts: AlertManager,
        quotes: Arc<dyn QuoteProvider>,
        notifier: Arc<dyn AlertNotifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            alerts,
            quotes,
            notifier,
            config,
            stats: Arc::new(RwLock::new(MonitorStats::default())),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Shared handle to the cumulative stats, for status and metrics endpoints.
    pub fn stats_handle(&self) -> Arc<RwLock<MonitorStats>> {
        Arc::clone(&self.stats)
    }

    pub async fn stats(&self) -> MonitorStats {
        self.stats.read().await.clone()
    }

    /// Run one pass over every active alert.
    pub async fn check_once(&self) -> PortfolioResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let batch_size = self.config.batch_size;
        let mut after_id = 0;

        loop {
            let batch = self.alerts.active_batch(after_id, batch_size as i64).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;
            report.batches += 1;

            self.process_batch(&batch, &mut report).await?;

            if batch.len() < batch_size {
                break;
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    async fn process_batch(&self, batch: &[PriceAlert], report: &mut CycleReport) -> PortfolioResult<()> {
        let symbols: BTreeSet<&str> = batch.iter().map(|a| a.symbol.as_str()).collect();

        // Demo quotes are synthetic and must never fire or seed an alert.
        let fetched = join_all(symbols.iter().map(|symbol| async move {
            let price = self.quotes.quote(symbol).await.and_then(|q| {
                if q.is_demo {
                    Err(BotError::Unavailable(format!("only demo data for {}", symbol)))
                } else {
                    Ok(q.price)
                }
            });
            (*symbol, price)
        }))
        .await;

        let mut prices: HashMap<&str, f64> = HashMap::with_capacity(fetched.len());
        for (symbol, result) in fetched {
            match result {
                Ok(price) => {
                    prices.insert(symbol, price);
                }
                Err(e) => {
                    report.quote_failures += 1;
                    tracing::warn!(symbol, error = %e, "Quote failed during alert check");
                }
            }
        }

        for alert in batch {
            report.alerts_checked += 1;

            let Some(&price) = prices.get(alert.symbol.as_str()) else {
                continue;
            };
            let condition = match alert.condition() {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(alert_id = alert.id, error = %e, "Skipping unreadable alert");
                    continue;
                }
            };

            if !condition.is_met(alert.reference_price, price, alert.target_price) {
                self.alerts.update_reference_price(alert.id, price).await?;
                continue;
            }

            let message = format_alert_message(alert, condition, price);
            match self.notifier.notify(alert.user_id, &message).await {
                Ok(()) => {
                    if self.alerts.mark_triggered(alert.id, price).await? {
                        report.triggered += 1;
                        tracing::info!(
                            alert_id = alert.id,
                            user_id = alert.user_id,
                            symbol = %alert.symbol,
                            price,
                            "Alert triggered"
                        );
                    }
                }
                Err(BotError::Undeliverable(reason)) => {
                    report.notify_failures += 1;
                    tracing::warn!(alert_id = alert.id, user_id = alert.user_id, %reason, "Alert recipient unreachable, cancelling alert");
                    self.alerts.cancel_alert(alert.user_id, alert.id).await?;
                }
                Err(e) => {
                    // Alert stays active and is retried next cycle
                    report.notify_failures += 1;
                    tracing::warn!(alert_id = alert.id, user_id = alert.user_id, error = %e, "Alert notification failed");
                }
            }
        }

        Ok(())
    }

    /// Poll on the configured interval until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.config.check_interval_seconds,
            batch_size = self.config.batch_size,
            "Alert monitor started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Alert monitor stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        match self.check_once().await {
            Ok(report) => {
                if report.alerts_checked > 0 {
                    tracing::info!(
                        checked = report.alerts_checked,
                        batches = report.batches,
                        triggered = report.triggered,
                        notify_failures = report.notify_failures,
                        quote_failures = report.quote_failures,
                        duration_ms = report.duration_ms,
                        "Alert check cycle complete"
                    );
                } else {
                    tracing::debug!("No active alerts");
                }

                let mut stats = self.stats.write().await;
                stats.record_cycle(&report);
                if stats.cycles_run.is_multiple_of(METRICS_LOG_INTERVAL) {
                    stats.log_metrics();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Alert check cycle failed");
                self.stats.write().await.record_failure();
            }
        }
    }
}

/// Body of the notification sent when an alert fires.
pub fn format_alert_message(alert: &PriceAlert, condition: AlertCondition, price: f64) -> String {
    let verb = match condition {
        AlertCondition::Above => "is above",
        AlertCondition::Below => "is below",
        AlertCondition::Cross => "crossed",
    };

    format!(
        "🚨 Alert Triggered!\n\n{} {} ${:.2}\nCurrent price: ${:.2}\nAlert #{} is now inactive.",
        alert.symbol, verb, alert.target_price, price, alert.id
    )
}
