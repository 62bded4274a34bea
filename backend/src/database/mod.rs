use sqlx::PgPool;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, AppError> {
        let url = config.database_url.clone().ok_or_else(|| {
            AppError::Validation("DATABASE_URL is required for postgres storage".to_string())
        })?;

        Ok(Self {
            url,
            max_connections: config.max_connections,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        })
    }
}

/// Connection pool plus schema management
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct DatabaseHealth {
    pub is_healthy: bool,
    pub response_time: Duration,
    pub pool_size: u32,
    pub idle_connections: usize,
    pub error: Option<String>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&config.url)
            .await?;

        info!(
            "Connected to database (max {} connections)",
            config.max_connections
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `backend/migrations`
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn health_check(&self) -> DatabaseHealth {
        let start = Instant::now();
        let result: Result<i32, sqlx::Error> =
            sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await;

        DatabaseHealth {
            is_healthy: result.is_ok(),
            response_time: start.elapsed(),
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
            error: result.err().map(|e| e.to_string()),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
