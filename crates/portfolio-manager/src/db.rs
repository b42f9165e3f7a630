use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct PortfolioDb {
    pool: SqlitePool,
    persistent: bool,
}

impl PortfolioDb {
    /// Open (creating if needed) a SQLite database and apply the schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let persistent = !is_memory_url(database_url);
        let options = SqliteConnectOptions::from_str(database_url)
            .context("invalid sqlite DATABASE_URL")?
            .create_if_missing(true);

        // An in-memory database lives and dies with its connection, so pin exactly one
        let pool_options = if persistent {
            SqlitePoolOptions::new().max_connections(5)
        } else {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        };

        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool, persistent };
        db.init_schema().await?;

        Ok(db)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new(MEMORY_URL).await
    }

    /// Use `DATABASE_URL` when it points at SQLite; otherwise fall back to memory.
    pub async fn from_env() -> Result<Self> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if url.starts_with("sqlite:") => {
                tracing::info!("Using SQLite database from DATABASE_URL");
                Self::new(&url).await
            }
            Ok(url) if !url.trim().is_empty() => {
                let scheme = url.split(':').next().unwrap_or("unknown");
                tracing::warn!(
                    scheme,
                    "DATABASE_URL is not a sqlite URL; using in-memory storage (data is lost on restart)"
                );
                Self::in_memory().await
            }
            _ => {
                tracing::warn!("DATABASE_URL not set; using in-memory storage (data is lost on restart)");
                Self::in_memory().await
            }
        }
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
