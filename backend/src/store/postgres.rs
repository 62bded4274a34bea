use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{CommerceStore, StoreTransaction};
use crate::error::AppError;
use crate::models::{
    Coupon, CouponUsage, InventoryMovement, InventoryValue, NewCoupon, NewCouponUsage,
    NewInventoryMovement, NewOrder, NewStockAlert, Order, OrderFilter, Pagination, Product,
    StockAlert, User, UserOrderStats,
};

/// Postgres-backed store. Each unit of work is one database transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        User::exists(&mut *self.tx, user_id).await
    }

    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Product::find_by_id(&mut *self.tx, product_id).await
    }

    async fn lock_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Product::lock_by_id(&mut *self.tx, product_id).await
    }

    async fn set_product_stock(&mut self, product_id: Uuid, stock: i32) -> Result<(), AppError> {
        Product::set_stock(&mut *self.tx, product_id, stock).await
    }

    async fn inventory_value(&mut self) -> Result<InventoryValue, AppError> {
        Product::inventory_value(&mut *self.tx).await
    }

    async fn insert_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, AppError> {
        InventoryMovement::create(&mut *self.tx, movement).await
    }

    async fn movements_since(
        &mut self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        InventoryMovement::find_since(&mut *self.tx, product_id, since).await
    }

    async fn last_movement_before(
        &mut self,
        product_id: Uuid,
        before: DateTime<Utc>,
    ) -> Result<Option<InventoryMovement>, AppError> {
        InventoryMovement::find_last_before(&mut *self.tx, product_id, before).await
    }

    async fn recent_movements(
        &mut self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        InventoryMovement::find_recent(&mut *self.tx, product_id, limit).await
    }

    async fn upsert_alert(&mut self, alert: NewStockAlert) -> Result<StockAlert, AppError> {
        StockAlert::upsert(&mut *self.tx, alert).await
    }

    async fn find_alert(&mut self, alert_id: Uuid) -> Result<Option<StockAlert>, AppError> {
        StockAlert::find_by_id(&mut *self.tx, alert_id).await
    }

    async fn active_alerts_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError> {
        StockAlert::find_active_by_product(&mut *self.tx, product_id).await
    }

    async fn triggered_alerts(&mut self) -> Result<Vec<StockAlert>, AppError> {
        StockAlert::find_triggered(&mut *self.tx).await
    }

    async fn save_alert(&mut self, alert: &StockAlert) -> Result<(), AppError> {
        StockAlert::save(&mut *self.tx, alert).await
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, AppError> {
        Order::number_exists(&mut *self.tx, order_number).await
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, AppError> {
        Order::create(&mut *self.tx, order).await
    }

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Order::find_by_id(&mut *self.tx, order_id).await
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Order::lock_by_id(&mut *self.tx, order_id).await
    }

    async fn find_order_by_number(&mut self, order_number: &str) -> Result<Option<Order>, AppError> {
        Order::find_by_number(&mut *self.tx, order_number).await
    }

    async fn save_order_status(&mut self, order: &Order) -> Result<(), AppError> {
        Order::update_status_fields(&mut *self.tx, order).await
    }

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), AppError> {
        Order::list(&mut *self.tx, filter, pagination).await
    }

    async fn count_user_orders(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Order::count_by_user(&mut *self.tx, user_id).await
    }

    async fn paid_order_stats(&mut self, user_id: Uuid) -> Result<UserOrderStats, AppError> {
        Order::paid_stats_for_user(&mut *self.tx, user_id).await
    }

    async fn insert_coupon(&mut self, coupon: NewCoupon) -> Result<Coupon, AppError> {
        Coupon::create(&mut *self.tx, coupon).await
    }

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError> {
        Coupon::find_by_code(&mut *self.tx, code).await
    }

    async fn lock_coupon(&mut self, coupon_id: Uuid) -> Result<Option<Coupon>, AppError> {
        Coupon::lock_by_id(&mut *self.tx, coupon_id).await
    }

    async fn count_coupon_usage_by_user(
        &mut self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        CouponUsage::count_for_user(&mut *self.tx, coupon_id, user_id).await
    }

    async fn find_coupon_usage_for_order(
        &mut self,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<CouponUsage>, AppError> {
        CouponUsage::find_for_order(&mut *self.tx, coupon_id, order_id).await
    }

    async fn insert_coupon_usage(&mut self, usage: NewCouponUsage) -> Result<CouponUsage, AppError> {
        CouponUsage::create(&mut *self.tx, usage).await
    }

    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<Coupon, AppError> {
        Coupon::increment_used_count(&mut *self.tx, coupon_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        debug!("Committed storefront transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        debug!("Rolled back storefront transaction");
        Ok(())
    }
}
