use crate::db::PortfolioDb;
use crate::error::{PortfolioError, PortfolioResult};
use chrono::Utc;

pub const MAX_WATCHLIST_SIZE: usize = 20;

#[derive(Clone)]
pub struct WatchlistManager {
    db: PortfolioDb,
}

impl WatchlistManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Symbols on the user's watchlist in the order they were added.
    pub async fn list(&self, user_id: i64) -> PortfolioResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT symbol FROM watchlist WHERE user_id = ? ORDER BY added_at ASC, rowid ASC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// Returns `false` if the symbol was already present.
    pub async fn add(&self, user_id: i64, symbol: &str) -> PortfolioResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watchlist WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        let (exists,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM watchlist WHERE user_id = ? AND symbol = ?")
                .bind(user_id)
                .bind(symbol)
                .fetch_one(self.db.pool())
                .await?;

        if exists > 0 {
            return Ok(false);
        }
        if count as usize >= MAX_WATCHLIST_SIZE {
            return Err(PortfolioError::WatchlistFull(MAX_WATCHLIST_SIZE));
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO watchlist (user_id, symbol, added_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(symbol)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` if the symbol was not on the list.
    pub async fn remove(&self, user_id: i64, symbol: &str) -> PortfolioResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE user_id = ? AND symbol = ?")
            .bind(user_id)
            .bind(symbol)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_remove_list() {
        let db = PortfolioDb::in_memory().await.unwrap();
        let watchlist = WatchlistManager::new(db);

        assert!(watchlist.add(1, "AAPL").await.unwrap());
        assert!(watchlist.add(1, "TSLA").await.unwrap());
        assert!(!watchlist.add(1, "AAPL").await.unwrap());
        assert!(watchlist.add(2, "AAPL").await.unwrap());

        assert_eq!(watchlist.list(1).await.unwrap(), vec!["AAPL", "TSLA"]);

        assert!(watchlist.remove(1, "AAPL").await.unwrap());
        assert!(!watchlist.remove(1, "AAPL").await.unwrap());
        assert_eq!(watchlist.list(1).await.unwrap(), vec!["TSLA"]);
        assert_eq!(watchlist.list(2).await.unwrap(), vec!["AAPL"]);
    }

    #[tokio::test]
    async fn test_watchlist_cap() {
        let db = PortfolioDb::in_memory().await.unwrap();
        let watchlist = WatchlistManager::new(db);

        for i in 0..MAX_WATCHLIST_SIZE {
            assert!(watchlist.add(5, &format!("SYM{}", i)).await.unwrap());
        }
        assert!(matches!(
            watchlist.add(5, "ONEMORE").await,
            Err(PortfolioError::WatchlistFull(20))
        ));
        // Re-adding an existing symbol is still a no-op, not an error
        assert!(!watchlist.add(5, "SYM0").await.unwrap());
    }
}
