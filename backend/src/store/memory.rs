use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use storefront_shared::{OrderStatus, PaymentStatus};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CommerceStore, StoreTransaction};
use crate::error::AppError;
use crate::models::coupon::normalize_code;
use crate::models::{
    Coupon, CouponUsage, InventoryMovement, InventoryValue, NewCoupon, NewCouponUsage,
    NewInventoryMovement, NewOrder, NewStockAlert, Order, OrderFilter, OrderItem, Pagination,
    Product, StockAlert, UserOrderStats,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashSet<Uuid>,
    products: HashMap<Uuid, Product>,
    /// Append-only movement arena; `movements_by_product` holds indices into it
    /// in insertion order.
    movements: Vec<InventoryMovement>,
    movements_by_product: HashMap<Uuid, Vec<usize>>,
    alerts: HashMap<Uuid, StockAlert>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashMap<String, Uuid>,
    coupons: HashMap<Uuid, Coupon>,
    coupon_codes: HashMap<String, Uuid>,
    usages: Vec<CouponUsage>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing clock so that rows written in one unit of work keep
    /// their insertion order.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn product_movements(&self, product_id: Uuid) -> impl Iterator<Item = &InventoryMovement> {
        self.movements_by_product
            .get(&product_id)
            .into_iter()
            .flatten()
            .filter_map(|idx| self.movements.get(*idx))
    }

    fn push_movement(&mut self, movement: InventoryMovement) -> InventoryMovement {
        let idx = self.movements.len();
        self.movements_by_product
            .entry(movement.product_id)
            .or_default()
            .push(idx);
        self.movements.push(movement.clone());
        movement
    }
}

/// In-process store. Units of work run one at a time: `begin` takes the
/// state lock and works on a copy that replaces the state on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user_id: Uuid) {
        self.state.lock().await.users.insert(user_id);
    }

    /// Seed an active catalog product
    pub async fn insert_product(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        category_id: Option<Uuid>,
    ) -> Product {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category_id,
            price,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        product
    }

    pub async fn set_product_active(&self, product_id: Uuid, is_active: bool) {
        if let Some(product) = self.state.lock().await.products.get_mut(&product_id) {
            product.is_active = is_active;
        }
    }

    /// Seed a ledger row with an explicit timestamp. Does not touch stock.
    pub async fn insert_movement_at(
        &self,
        movement: NewInventoryMovement,
        created_at: DateTime<Utc>,
    ) -> InventoryMovement {
        let mut state = self.state.lock().await;
        state.push_movement(movement_row(movement, created_at))
    }

    pub async fn product_stock(&self, product_id: Uuid) -> Option<i32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    pub async fn movements_for(&self, product_id: Uuid) -> Vec<InventoryMovement> {
        let state = self.state.lock().await;
        let movements = state.product_movements(product_id).cloned().collect();
        movements
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn coupon_usages(&self, coupon_id: Uuid) -> Vec<CouponUsage> {
        self.state
            .lock()
            .await
            .usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id)
            .cloned()
            .collect()
    }

    /// Overwrite payment status directly, standing in for the payment flow
    pub async fn set_payment_status(&self, order_id: Uuid, payment_status: PaymentStatus) {
        if let Some(order) = self.state.lock().await.orders.get_mut(&order_id) {
            order.payment_status = payment_status;
        }
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn movement_row(movement: NewInventoryMovement, created_at: DateTime<Utc>) -> InventoryMovement {
    InventoryMovement {
        id: Uuid::new_v4(),
        product_id: movement.product_id,
        movement_type: movement.movement_type,
        reason: movement.reason,
        quantity: movement.quantity,
        previous_stock: movement.previous_stock,
        new_stock: movement.new_stock,
        cost: movement.cost,
        price: movement.price,
        notes: movement.notes,
        reference_id: movement.reference_id,
        reference_type: movement.reference_type,
        created_by_id: movement.created_by_id,
        created_at,
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.users.contains(&user_id))
    }

    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn lock_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        // The whole state is already held exclusively.
        self.find_product(product_id).await
    }

    async fn set_product_stock(&mut self, product_id: Uuid, stock: i32) -> Result<(), AppError> {
        if stock < 0 {
            return Err(AppError::Internal(format!(
                "Refusing negative stock {} for product {}",
                stock, product_id
            )));
        }
        let now = self.working.tick();
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::product_not_found(product_id))?;
        product.stock = stock;
        product.updated_at = now;
        Ok(())
    }

    async fn inventory_value(&mut self) -> Result<InventoryValue, AppError> {
        let in_stock = self.working.products.values().filter(|p| p.stock > 0);
        let (total_value, product_count) = in_stock.fold((Decimal::ZERO, 0i64), |(sum, n), p| {
            (sum + p.price * Decimal::from(p.stock), n + 1)
        });

        Ok(InventoryValue {
            total_value,
            product_count,
        })
    }

    async fn insert_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, AppError> {
        if !self.working.products.contains_key(&movement.product_id) {
            return Err(AppError::product_not_found(movement.product_id));
        }
        let created_at = self.working.tick();
        Ok(self.working.push_movement(movement_row(movement, created_at)))
    }

    async fn movements_since(
        &mut self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let mut movements: Vec<InventoryMovement> = self
            .working
            .product_movements(product_id)
            .filter(|m| m.created_at >= since)
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.created_at);
        Ok(movements)
    }

    async fn last_movement_before(
        &mut self,
        product_id: Uuid,
        before: DateTime<Utc>,
    ) -> Result<Option<InventoryMovement>, AppError> {
        Ok(self
            .working
            .product_movements(product_id)
            .filter(|m| m.created_at < before)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn recent_movements(
        &mut self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        let mut movements: Vec<InventoryMovement> =
            self.working.product_movements(product_id).cloned().collect();
        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        movements.truncate(limit.max(0) as usize);
        Ok(movements)
    }

    async fn upsert_alert(&mut self, alert: NewStockAlert) -> Result<StockAlert, AppError> {
        let now = self.working.tick();
        let existing = self
            .working
            .alerts
            .values_mut()
            .find(|a| a.product_id == alert.product_id && a.alert_type == alert.alert_type);

        if let Some(saved) = existing {
            saved.threshold_quantity = alert.threshold_quantity;
            saved.current_quantity = alert.current_quantity;
            saved.is_active = true;
            saved.updated_at = now;
            return Ok(saved.clone());
        }

        let saved = StockAlert {
            id: Uuid::new_v4(),
            product_id: alert.product_id,
            alert_type: alert.alert_type,
            threshold_quantity: alert.threshold_quantity,
            current_quantity: alert.current_quantity,
            is_active: true,
            last_triggered_at: None,
            message: None,
            created_at: now,
            updated_at: now,
        };
        self.working.alerts.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_alert(&mut self, alert_id: Uuid) -> Result<Option<StockAlert>, AppError> {
        Ok(self.working.alerts.get(&alert_id).cloned())
    }

    async fn active_alerts_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError> {
        let mut alerts: Vec<StockAlert> = self
            .working
            .alerts
            .values()
            .filter(|a| a.product_id == product_id && a.is_active)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.alert_type as u8);
        Ok(alerts)
    }

    async fn triggered_alerts(&mut self) -> Result<Vec<StockAlert>, AppError> {
        let mut alerts: Vec<StockAlert> = self
            .working
            .alerts
            .values()
            .filter(|a| a.is_active && a.last_triggered_at.is_some())
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.last_triggered_at.cmp(&a.last_triggered_at));
        Ok(alerts)
    }

    async fn save_alert(&mut self, alert: &StockAlert) -> Result<(), AppError> {
        let now = self.working.tick();
        let saved = self
            .working
            .alerts
            .get_mut(&alert.id)
            .ok_or_else(|| AppError::NotFound(format!("Stock alert {} not found", alert.id)))?;
        saved.current_quantity = alert.current_quantity;
        saved.is_active = alert.is_active;
        saved.last_triggered_at = alert.last_triggered_at;
        saved.message = alert.message.clone();
        saved.updated_at = now;
        Ok(())
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, AppError> {
        Ok(self.working.order_numbers.contains_key(order_number))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, AppError> {
        if self.working.order_numbers.contains_key(&order.order_number) {
            return Err(AppError::Conflict(format!(
                "Order number {} already exists",
                order.order_number
            )));
        }

        let now = self.working.tick();
        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                subtotal: item.subtotal,
                created_at: self.working.tick(),
            });
        }

        let shipping = order.shipping;
        let saved = Order {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            shipping_cost: order.shipping_cost,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            coupon_code: order.coupon_code,
            shipping_full_name: shipping.full_name,
            shipping_address_line1: shipping.address_line1,
            shipping_address_line2: shipping.address_line2,
            shipping_city: shipping.city,
            shipping_state: shipping.state,
            shipping_postal_code: shipping.postal_code,
            shipping_country: shipping.country,
            shipping_phone: shipping.phone,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            items,
        };

        self.working
            .order_numbers
            .insert(saved.order_number.clone(), saved.id);
        self.working.orders.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        self.find_order(order_id).await
    }

    async fn find_order_by_number(&mut self, order_number: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .working
            .order_numbers
            .get(order_number)
            .and_then(|id| self.working.orders.get(id))
            .cloned())
    }

    async fn save_order_status(&mut self, order: &Order) -> Result<(), AppError> {
        let now = self.working.tick();
        let saved = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| AppError::order_not_found(order.id))?;
        saved.status = order.status;
        saved.payment_status = order.payment_status;
        saved.shipped_at = order.shipped_at;
        saved.delivered_at = order.delivered_at;
        saved.cancelled_at = order.cancelled_at;
        saved.updated_at = now;
        Ok(())
    }

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let mut matching: Vec<&Order> = self
            .working
            .orders
            .values()
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(pagination.offset.max(0) as usize)
            .take(pagination.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn count_user_orders(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .count() as i64)
    }

    async fn paid_order_stats(&mut self, user_id: Uuid) -> Result<UserOrderStats, AppError> {
        let paid = self
            .working
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.payment_status == PaymentStatus::Paid);

        Ok(paid.fold(UserOrderStats::default(), |mut stats, order| {
            stats.paid_order_count += 1;
            stats.total_spent += order.total_amount;
            stats
        }))
    }

    async fn insert_coupon(&mut self, coupon: NewCoupon) -> Result<Coupon, AppError> {
        let code = normalize_code(&coupon.code);
        if self.working.coupon_codes.contains_key(&code) {
            return Err(AppError::Conflict(format!("Coupon {} already exists", code)));
        }

        let now = self.working.tick();
        let saved = Coupon {
            id: Uuid::new_v4(),
            code: code.clone(),
            description: coupon.description,
            coupon_type: coupon.coupon_type,
            value: coupon.value,
            minimum_order_amount: coupon.minimum_order_amount,
            maximum_discount_amount: coupon.maximum_discount_amount,
            usage_limit: coupon.usage_limit,
            usage_limit_per_user: coupon.usage_limit_per_user,
            used_count: 0,
            valid_from: coupon.valid_from,
            valid_until: coupon.valid_until,
            is_active: true,
            applicable_categories: coupon.applicable_categories,
            applicable_products: coupon.applicable_products,
            excluded_categories: coupon.excluded_categories,
            excluded_products: coupon.excluded_products,
            is_first_time_user_only: coupon.is_first_time_user_only,
            created_at: now,
            updated_at: now,
        };

        self.working.coupon_codes.insert(code, saved.id);
        self.working.coupons.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError> {
        Ok(self
            .working
            .coupon_codes
            .get(&normalize_code(code))
            .and_then(|id| self.working.coupons.get(id))
            .cloned())
    }

    async fn lock_coupon(&mut self, coupon_id: Uuid) -> Result<Option<Coupon>, AppError> {
        Ok(self.working.coupons.get(&coupon_id).cloned())
    }

    async fn count_coupon_usage_by_user(
        &mut self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .working
            .usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id && u.user_id == user_id)
            .count() as i64)
    }

    async fn find_coupon_usage_for_order(
        &mut self,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<CouponUsage>, AppError> {
        Ok(self
            .working
            .usages
            .iter()
            .find(|u| u.coupon_id == coupon_id && u.order_id == Some(order_id))
            .cloned())
    }

    async fn insert_coupon_usage(&mut self, usage: NewCouponUsage) -> Result<CouponUsage, AppError> {
        if let Some(order_id) = usage.order_id {
            let duplicate = self
                .working
                .usages
                .iter()
                .any(|u| u.coupon_id == usage.coupon_id && u.order_id == Some(order_id));
            if duplicate {
                return Err(AppError::Conflict(format!(
                    "Coupon already applied to order {}",
                    order_id
                )));
            }
        }

        let saved = CouponUsage {
            id: Uuid::new_v4(),
            user_id: usage.user_id,
            coupon_id: usage.coupon_id,
            order_id: usage.order_id,
            discount_amount: usage.discount_amount,
            used_at: self.working.tick(),
        };
        self.working.usages.push(saved.clone());
        Ok(saved)
    }

    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<Coupon, AppError> {
        let now = self.working.tick();
        let coupon = self
            .working
            .coupons
            .get_mut(&coupon_id)
            .ok_or_else(|| AppError::NotFound(format!("Coupon {} not found", coupon_id)))?;
        coupon.used_count += 1;
        coupon.updated_at = now;
        Ok(coupon.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
