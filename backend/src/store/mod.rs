//! Unit-of-work seam between the services and the backing store.
//!
//! Every service operation begins a [`StoreTransaction`], performs all of its
//! reads and writes through it, and then commits. Dropping a transaction
//! without committing discards its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Coupon, CouponUsage, InventoryMovement, InventoryValue, NewCoupon, NewCouponUsage,
    NewInventoryMovement, NewOrder, NewStockAlert, Order, OrderFilter, Pagination, Product,
    StockAlert, UserOrderStats,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type SharedStore = Arc<dyn CommerceStore>;

#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Start a new unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    // Users
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, AppError>;

    // Catalog
    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError>;

    /// Read a product and hold it exclusively until commit or rollback.
    async fn lock_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError>;

    async fn set_product_stock(&mut self, product_id: Uuid, stock: i32) -> Result<(), AppError>;

    async fn inventory_value(&mut self) -> Result<InventoryValue, AppError>;

    // Ledger
    async fn insert_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, AppError>;

    /// Movements created at or after `since`, oldest first.
    async fn movements_since(
        &mut self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryMovement>, AppError>;

    async fn last_movement_before(
        &mut self,
        product_id: Uuid,
        before: DateTime<Utc>,
    ) -> Result<Option<InventoryMovement>, AppError>;

    /// Newest first.
    async fn recent_movements(
        &mut self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError>;

    // Stock alerts
    async fn upsert_alert(&mut self, alert: NewStockAlert) -> Result<StockAlert, AppError>;

    async fn find_alert(&mut self, alert_id: Uuid) -> Result<Option<StockAlert>, AppError>;

    async fn active_alerts_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError>;

    async fn triggered_alerts(&mut self) -> Result<Vec<StockAlert>, AppError>;

    async fn save_alert(&mut self, alert: &StockAlert) -> Result<(), AppError>;

    // Orders
    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, AppError>;

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, AppError>;

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    /// Read an order and hold it exclusively until commit or rollback.
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    async fn find_order_by_number(&mut self, order_number: &str) -> Result<Option<Order>, AppError>;

    async fn save_order_status(&mut self, order: &Order) -> Result<(), AppError>;

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), AppError>;

    async fn count_user_orders(&mut self, user_id: Uuid) -> Result<i64, AppError>;

    async fn paid_order_stats(&mut self, user_id: Uuid) -> Result<UserOrderStats, AppError>;

    // Coupons
    async fn insert_coupon(&mut self, coupon: NewCoupon) -> Result<Coupon, AppError>;

    /// Case-insensitive lookup.
    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError>;

    /// Read a coupon and hold it exclusively until commit or rollback.
    async fn lock_coupon(&mut self, coupon_id: Uuid) -> Result<Option<Coupon>, AppError>;

    async fn count_coupon_usage_by_user(
        &mut self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError>;

    async fn find_coupon_usage_for_order(
        &mut self,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<CouponUsage>, AppError>;

    async fn insert_coupon_usage(&mut self, usage: NewCouponUsage) -> Result<CouponUsage, AppError>;

    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<Coupon, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
