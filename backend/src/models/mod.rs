//! Database models for the storefront core
//!
//! Each model corresponds to a database table and owns the SQL that reads and
//! writes it. Models take a `PgConnection` so that callers decide the
//! transaction boundary.

pub mod coupon;
pub mod inventory;
pub mod order;
pub mod product;
pub mod user;

// Re-export commonly used models
pub use coupon::{Coupon, CouponLine, CouponUsage, NewCoupon, NewCouponUsage};
pub use inventory::{InventoryMovement, NewInventoryMovement, NewStockAlert, StockAlert, StockHistoryPoint};
pub use order::{NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, UserOrderStats};
pub use product::{InventoryValue, Product};
pub use user::User;

use serde::Serialize;
use storefront_shared::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Pagination helper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn page(page: Option<i64>, per_page: Option<i64>) -> Self {
        let limit = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        Self {
            page,
            limit,
            offset: (page - 1) * limit,
        }
    }
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            has_more: pagination.offset + (items.len() as i64) < total,
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }
}
