use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storefront_backend::config::{AppConfig, StorageBackend};
use storefront_backend::database::{Database, DatabaseConfig};
use storefront_backend::error::AppError;
use storefront_backend::middleware::RequestTiming;
use storefront_backend::store::{MemoryStore, PgStore, SharedStore};
use storefront_backend::Services;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let pricing = config.pricing_policy()?;
    info!(
        "Starting storefront backend on {}:{} (tax {}, shipping {}, free over {})",
        config.host, config.port, pricing.tax_rate, pricing.shipping_fee, pricing.free_shipping_threshold
    );

    let mut database = None;
    let store: SharedStore = match config.storage {
        StorageBackend::Postgres => {
            let db = Database::connect(&DatabaseConfig::from_app_config(&config)?).await?;
            db.migrate().await?;

            let health = db.health_check().await;
            if !health.is_healthy {
                return Err(AppError::Internal(format!(
                    "Database health check failed: {}",
                    health.error.unwrap_or_default()
                )));
            }
            info!(
                "Database healthy ({:?}, {} connections)",
                health.response_time, health.pool_size
            );

            let store: SharedStore = Arc::new(PgStore::new(db.pool().clone()));
            database = Some(db);
            store
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let services = Services::new(store, pricing);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(RequestTiming::new())
            .configure(|cfg| storefront_backend::configure(cfg, &services))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    if let Some(db) = database {
        db.close().await;
        info!("Database pool closed");
    }

    Ok(())
}
