use crate::db::PortfolioDb;
use crate::error::{PortfolioError, PortfolioResult};
use crate::models::*;
use chrono::Utc;

pub const MAX_ACTIVE_ALERTS_PER_USER: usize = 25;

#[derive(Clone)]
pub struct AlertManager {
    db: PortfolioDb,
}

impl AlertManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Create a new price alert
    pub async fn create_alert(&self, alert: NewAlert) -> PortfolioResult<PriceAlert> {
        if !alert.target_price.is_finite() || alert.target_price <= 0.0 {
            return Err(PortfolioError::InvalidAlert("target price must be a positive number".into()));
        }

        let (active,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM price_alerts WHERE user_id = ? AND status = 'active'",
        )
        .bind(alert.user_id)
        .fetch_one(self.db.pool())
        .await?;

        if active as usize >= MAX_ACTIVE_ALERTS_PER_USER {
            return Err(PortfolioError::AlertLimit(MAX_ACTIVE_ALERTS_PER_USER));
        }

        let created = sqlx::query_as::<_, PriceAlert>(
            r#"
            INSERT INTO price_alerts
            (user_id, symbol, condition_type, target_price, reference_price, status, created_at)
            VALUES (?, ?, ?, ?, ?, 'active', ?)
            RETURNING *
            "#,
        )
        .bind(alert.user_id)
        .bind(&alert.symbol)
        .bind(alert.condition.as_str())
        .bind(alert.target_price)
        .bind(alert.reference_price)
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        tracing::info!(
            alert_id = created.id,
            user_id = alert.user_id,
            symbol = %alert.symbol,
            condition = alert.condition.as_str(),
            target = alert.target_price,
            "Alert created"
        );

        Ok(created)
    }

    /// Active alerts belonging to a user, oldest first.
    pub async fn user_alerts(&self, user_id: i64) -> PortfolioResult<Vec<PriceAlert>> {
        let alerts = sqlx::query_as::<_, PriceAlert>(
            "SELECT * FROM price_alerts WHERE user_id = ? AND status = 'active' ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(alerts)
    }

    pub async fn get_alert(&self, id: i64) -> PortfolioResult<Option<PriceAlert>> {
        let alert = sqlx::query_as::<_, PriceAlert>("SELECT * FROM price_alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(alert)
    }

    /// Cancel one of the user's own active alerts. Returns `false` if nothing matched.
    pub async fn cancel_alert(&self, user_id: i64, id: i64) -> PortfolioResult<bool> {
        let result = sqlx::query(
            "UPDATE price_alerts SET status = 'cancelled' WHERE id = ? AND user_id = ? AND status = 'active'",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Next page of active alerts with `id > after_id`, ordered by id.
    ///
    /// Keyset pagination keeps pages stable while earlier alerts are being
    /// triggered during the same monitoring cycle.
    pub async fn active_batch(&self, after_id: i64, limit: i64) -> PortfolioResult<Vec<PriceAlert>> {
        let alerts = sqlx::query_as::<_, PriceAlert>(
            "SELECT * FROM price_alerts WHERE status = 'active' AND id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(alerts)
    }

    /// Deactivate a triggered alert. Returns `false` if it was no longer active.
    pub async fn mark_triggered(&self, id: i64, price: f64) -> PortfolioResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE price_alerts
            SET status = 'triggered', triggered_at = ?, triggered_price = ?, reference_price = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(Utc::now())
        .bind(price)
        .bind(price)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_reference_price(&self, id: i64, price: f64) -> PortfolioResult<()> {
        sqlx::query("UPDATE price_alerts SET reference_price = ? WHERE id = ? AND status = 'active'")
            .bind(price)
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    pub async fn count_active(&self) -> PortfolioResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_alerts WHERE status = 'active'")
                .fetch_one(self.db.pool())
                .await?;

        Ok(count)
    }
}
