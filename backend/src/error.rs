use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use storefront_shared::ApiResponse;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn product_not_found(product_id: Uuid) -> Self {
        AppError::NotFound(format!("Product {} not found", product_id))
    }

    pub fn product_unavailable(product_id: Uuid) -> Self {
        AppError::Conflict(format!("Product {} is not available", product_id))
    }

    pub fn insufficient_stock(product_id: Uuid, available: i32, requested: i32) -> Self {
        AppError::Conflict(format!(
            "Insufficient stock for product {}. Available: {}, Requested: {}",
            product_id, available, requested
        ))
    }

    pub fn user_not_found(user_id: Uuid) -> Self {
        AppError::NotFound(format!("User {} not found", user_id))
    }

    pub fn order_not_found(order_id: Uuid) -> Self {
        AppError::NotFound(format!("Order {} not found", order_id))
    }

    pub fn order_not_cancellable(order_number: &str, status: impl std::fmt::Display) -> Self {
        AppError::Conflict(format!(
            "Order {} cannot be cancelled while {}",
            order_number, status
        ))
    }

    pub fn invalid_coupon(reason: impl std::fmt::Display) -> Self {
        AppError::Validation(format!("Invalid coupon: {}", reason))
    }

    /// Message shown to API clients. Internal failures never leak details.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Authentication(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            _ => "An internal server error occurred".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        HttpResponse::build(status).json(ApiResponse::error(self.public_message()))
    }
}
