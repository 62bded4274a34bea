use serde::{Deserialize, Serialize};
use std::fmt;

// Order-related enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Orders that have left the warehouse can no longer be cancelled.
    pub fn is_cancellable(&self) -> bool {
        !matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

// Inventory-related enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Return,
    Damaged,
    Expired,
    Transfer,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementType::Purchase => write!(f, "purchase"),
            MovementType::Sale => write!(f, "sale"),
            MovementType::Adjustment => write!(f, "adjustment"),
            MovementType::Return => write!(f, "return"),
            MovementType::Damaged => write!(f, "damaged"),
            MovementType::Expired => write!(f, "expired"),
            MovementType::Transfer => write!(f, "transfer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    OrderSale,
    OrderCancellation,
    ManualAdjustment,
    Restock,
    CustomerReturn,
    Damage,
    Expiry,
    StockTransfer,
    InventoryCount,
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementReason::OrderSale => write!(f, "order_sale"),
            MovementReason::OrderCancellation => write!(f, "order_cancellation"),
            MovementReason::ManualAdjustment => write!(f, "manual_adjustment"),
            MovementReason::Restock => write!(f, "restock"),
            MovementReason::CustomerReturn => write!(f, "customer_return"),
            MovementReason::Damage => write!(f, "damage"),
            MovementReason::Expiry => write!(f, "expiry"),
            MovementReason::StockTransfer => write!(f, "stock_transfer"),
            MovementReason::InventoryCount => write!(f, "inventory_count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    Overstock,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::LowStock => write!(f, "low_stock"),
            AlertType::OutOfStock => write!(f, "out_of_stock"),
            AlertType::Overstock => write!(f, "overstock"),
        }
    }
}

// Coupon-related enums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Percentage,
    FixedAmount,
    FreeShipping,
}

impl fmt::Display for CouponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponType::Percentage => write!(f, "percentage"),
            CouponType::FixedAmount => write!(f, "fixed_amount"),
            CouponType::FreeShipping => write!(f, "free_shipping"),
        }
    }
}
