use crate::types::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Envelope returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

// Order DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,

    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,

    #[validate(length(max = 255))]
    pub address_line2: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub city: String,

    #[validate(length(max = 100))]
    pub state: Option<String>,

    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,

    #[validate(length(min = 2, max = 100))]
    pub country: String,

    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 100))]
    pub items: Vec<OrderLineRequest>,

    pub shipping: ShippingInfo,

    #[validate(length(min = 1, max = 50))]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,

    #[validate(range(min = 1))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

// Inventory DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub reason: MovementReason,
    pub quantity: i32,
    pub cost: Option<Decimal>,
    pub price: Option<Decimal>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,

    pub reference_id: Option<Uuid>,

    #[validate(length(max = 50))]
    pub reference_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustInventoryRequest {
    pub product_id: Uuid,

    #[validate(range(min = 0))]
    pub new_quantity: i32,

    pub reason: MovementReason,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockHistoryQuery {
    #[validate(range(min = 1, max = 365))]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementListQuery {
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertStockAlertRequest {
    pub product_id: Uuid,
    pub alert_type: AlertType,

    #[validate(range(min = 0))]
    pub threshold_quantity: i32,
}

// Coupon DTOs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,

    pub order_total: Decimal,

    #[validate(length(min = 1, max = 100))]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 50))]
    pub code: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,

    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,

    #[validate(range(min = 1))]
    pub usage_limit_per_user: Option<i32>,

    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,

    #[serde(default)]
    pub applicable_categories: Vec<Uuid>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub excluded_categories: Vec<Uuid>,
    #[serde(default)]
    pub excluded_products: Vec<Uuid>,
    #[serde(default)]
    pub is_first_time_user_only: bool,
}
