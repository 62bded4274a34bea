use super::*;
use crate::models::{
    Coupon, CouponUsage, InventoryMovement, InventoryValue, NewCoupon, NewCouponUsage,
    NewInventoryMovement, NewStockAlert, Product, StockAlert,
};
use crate::services::CouponService;
use crate::store::{CommerceStore, MemoryStore};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use storefront_shared::{
    CouponType, CreateCouponRequest, OrderLineRequest, PaymentStatus, ShippingInfo,
};

struct Fixture {
    store: MemoryStore,
    orders: OrderService,
    coupons: CouponService,
    user_id: Uuid,
}

async fn setup() -> Fixture {
    let store = MemoryStore::new();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id).await;
    let shared: SharedStore = Arc::new(store.clone());

    Fixture {
        orders: OrderService::new(shared.clone(), PricingPolicy::default()),
        coupons: CouponService::new(shared),
        store,
        user_id,
    }
}

fn shipping() -> ShippingInfo {
    ShippingInfo {
        full_name: "Ada Lovelace".to_string(),
        address_line1: "12 Analytical Row".to_string(),
        address_line2: None,
        city: "London".to_string(),
        state: None,
        postal_code: "N1 9GU".to_string(),
        country: "GB".to_string(),
        phone: None,
    }
}

fn request(lines: &[(Uuid, i32)], coupon_code: Option<&str>) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: lines
            .iter()
            .map(|(product_id, quantity)| OrderLineRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        shipping: shipping(),
        coupon_code: coupon_code.map(str::to_string),
    }
}

async fn product(store: &MemoryStore, price: Decimal, stock: i32) -> Product {
    store.insert_product("Mug", price, stock, None).await
}

fn coupon_terms(code: &str, coupon_type: CouponType, value: Decimal) -> CreateCouponRequest {
    let now = Utc::now();
    CreateCouponRequest {
        code: code.to_string(),
        description: None,
        coupon_type,
        value,
        minimum_order_amount: None,
        maximum_discount_amount: None,
        usage_limit: None,
        usage_limit_per_user: None,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(1),
        applicable_categories: vec![],
        applicable_products: vec![],
        excluded_categories: vec![],
        excluded_products: vec![],
        is_first_time_user_only: false,
    }
}

#[tokio::test]
async fn test_place_order_worked_example() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::new(2000, 2), 5).await;

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 3)], None))
        .await
        .unwrap();

    assert_eq!(order.subtotal, Decimal::new(6000, 2));
    assert_eq!(order.tax_amount, Decimal::new(480, 2));
    assert_eq!(order.shipping_cost, Decimal::new(999, 2));
    assert_eq!(order.discount_amount, Decimal::ZERO);
    assert_eq!(order.total_amount, Decimal::new(7479, 2));
    assert!(order.totals_are_consistent());
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].subtotal, Decimal::new(6000, 2));
    assert_eq!(f.store.product_stock(mug.id).await, Some(2));

    let movements = f.store.movements_for(mug.id).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::Sale);
    assert_eq!(movements[0].reason, MovementReason::OrderSale);
    assert_eq!(movements[0].quantity, -3);
    assert_eq!(movements[0].reference_id, Some(order.id));
    assert_eq!(movements[0].reference_type.as_deref(), Some("order"));

    let cancelled = f.orders.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(f.store.product_stock(mug.id).await, Some(5));

    let movements = f.store.movements_for(mug.id).await;
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[1].movement_type, MovementType::Return);
    assert_eq!(movements[1].reason, MovementReason::OrderCancellation);
    assert_eq!(movements[1].quantity, 3);
}

#[tokio::test]
async fn test_free_shipping_above_threshold() {
    let f = setup().await;
    let lamp = product(&f.store, Decimal::new(10001, 2), 1).await;

    let order = f
        .orders
        .place_order(f.user_id, request(&[(lamp.id, 1)], None))
        .await
        .unwrap();

    assert_eq!(order.shipping_cost, Decimal::ZERO);
    assert!(order.totals_are_consistent());
}

#[tokio::test]
async fn test_subtotal_at_threshold_still_pays_shipping() {
    let f = setup().await;
    let lamp = product(&f.store, Decimal::from(100), 1).await;

    let order = f
        .orders
        .place_order(f.user_id, request(&[(lamp.id, 1)], None))
        .await
        .unwrap();

    assert_eq!(order.shipping_cost, Decimal::new(999, 2));
}

#[tokio::test]
async fn test_injected_pricing_policy() {
    let f = setup().await;
    let policy = PricingPolicy::parse("0.2", "5", "1000").unwrap();
    let orders = OrderService::new(Arc::new(f.store.clone()), policy);
    let mug = product(&f.store, Decimal::from(10), 5).await;

    let order = orders
        .place_order(f.user_id, request(&[(mug.id, 2)], None))
        .await
        .unwrap();

    assert_eq!(order.tax_amount, Decimal::from(4));
    assert_eq!(order.shipping_cost, Decimal::from(5));
    assert_eq!(order.total_amount, Decimal::from(29));
}

#[tokio::test]
async fn test_failed_multi_item_order_leaves_nothing_behind() {
    let f = setup().await;
    let plenty = product(&f.store, Decimal::from(5), 10).await;
    let scarce = product(&f.store, Decimal::from(5), 1).await;

    let result = f
        .orders
        .place_order(f.user_id, request(&[(plenty.id, 2), (scarce.id, 2)], None))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(f.store.product_stock(plenty.id).await, Some(10));
    assert_eq!(f.store.product_stock(scarce.id).await, Some(1));
    assert!(f.store.movements_for(plenty.id).await.is_empty());
    assert!(f.store.movements_for(scarce.id).await.is_empty());
    assert_eq!(f.store.order_count().await, 0);
}

#[tokio::test]
async fn test_inactive_or_missing_product_is_unavailable() {
    let f = setup().await;
    let retired = product(&f.store, Decimal::from(5), 10).await;
    f.store.set_product_active(retired.id, false).await;

    let inactive = f
        .orders
        .place_order(f.user_id, request(&[(retired.id, 1)], None))
        .await;
    assert!(matches!(inactive, Err(AppError::Conflict(_))));

    let missing = f
        .orders
        .place_order(f.user_id, request(&[(Uuid::new_v4(), 1)], None))
        .await;
    assert!(matches!(missing, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(5), 10).await;

    let result = f
        .orders
        .place_order(Uuid::new_v4(), request(&[(mug.id, 1)], None))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(f.store.product_stock(mug.id).await, Some(10));
}

#[tokio::test]
async fn test_duplicate_lines_are_merged() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(5), 3).await;

    let result = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 2), (mug.id, 2)], None))
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1), (mug.id, 2)], None))
        .await
        .unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(f.store.product_stock(mug.id).await, Some(0));
}

#[tokio::test]
async fn test_coupon_discount_applied_and_recorded() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(50), 10).await;
    let mut terms = coupon_terms("SAVE10", CouponType::Percentage, Decimal::from(10));
    terms.maximum_discount_amount = Some(Decimal::from(5));
    let save10 = f.coupons.create_coupon(terms).await.unwrap();

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 2)], Some("save10")))
        .await
        .unwrap();

    assert_eq!(order.subtotal, Decimal::from(100));
    assert_eq!(order.tax_amount, Decimal::from(8));
    assert_eq!(order.shipping_cost, Decimal::new(999, 2));
    assert_eq!(order.discount_amount, Decimal::from(5));
    assert_eq!(order.total_amount, Decimal::new(11299, 2));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
    assert!(order.totals_are_consistent());

    let usages = f.store.coupon_usages(save10.id).await;
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].order_id, Some(order.id));
    assert_eq!(usages[0].discount_amount, Decimal::from(5));
    assert_eq!(f.coupons.get_coupon("SAVE10").await.unwrap().used_count, 1);
}

#[tokio::test]
async fn test_free_shipping_coupon_waives_shipping() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;
    let terms = coupon_terms("SHIPFREE", CouponType::FreeShipping, Decimal::ZERO);
    f.coupons.create_coupon(terms).await.unwrap();

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("SHIPFREE")))
        .await
        .unwrap();

    assert_eq!(order.shipping_cost, Decimal::ZERO);
    assert_eq!(order.discount_amount, Decimal::ZERO);
    assert_eq!(order.total_amount, Decimal::new(1080, 2));
}

#[tokio::test]
async fn test_discount_clamped_to_keep_total_non_negative() {
    let f = setup().await;
    let pin = product(&f.store, Decimal::from(1), 10).await;
    let terms = coupon_terms("HUGE", CouponType::FixedAmount, Decimal::from(500));
    f.coupons.create_coupon(terms).await.unwrap();

    let order = f
        .orders
        .place_order(f.user_id, request(&[(pin.id, 1)], Some("HUGE")))
        .await
        .unwrap();

    assert!(order.total_amount >= Decimal::ZERO);
    assert!(order.totals_are_consistent());
}

#[tokio::test]
async fn test_invalid_coupon_fails_whole_order() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;

    let result = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("GHOST")))
        .await;

    match result {
        Err(AppError::Validation(msg)) => assert!(msg.contains("Coupon not found")),
        other => panic!("expected invalid coupon, got {:?}", other),
    }
    assert_eq!(f.store.product_stock(mug.id).await, Some(10));
    assert_eq!(f.store.order_count().await, 0);
}

#[tokio::test]
async fn test_per_user_coupon_limit_across_orders() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;
    let mut terms = coupon_terms("ONCE", CouponType::FixedAmount, Decimal::from(2));
    terms.usage_limit_per_user = Some(1);
    f.coupons.create_coupon(terms).await.unwrap();

    f.orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("ONCE")))
        .await
        .unwrap();
    let second = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("ONCE")))
        .await;

    match second {
        Err(AppError::Validation(msg)) => assert!(msg.contains("per-user limit reached")),
        other => panic!("expected per-user limit, got {:?}", other),
    }
    assert_eq!(f.store.product_stock(mug.id).await, Some(9));
}

#[tokio::test]
async fn test_first_order_only_coupon_rejected_for_returning_customer() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;
    let mut terms = coupon_terms("WELCOME", CouponType::FixedAmount, Decimal::from(3));
    terms.is_first_time_user_only = true;
    f.coupons.create_coupon(terms).await.unwrap();

    f.orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();
    let result = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("WELCOME")))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_first_order_only_coupon_accepted_on_first_order() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;
    let mut terms = coupon_terms("WELCOME", CouponType::FixedAmount, Decimal::from(3));
    terms.is_first_time_user_only = true;
    let welcome = f.coupons.create_coupon(terms).await.unwrap();

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], Some("WELCOME")))
        .await
        .unwrap();

    assert_eq!(order.discount_amount, Decimal::from(3));
    assert_eq!(f.store.coupon_usages(welcome.id).await.len(), 1);

    let repeat = f
        .coupons
        .apply_coupon(welcome.id, f.user_id, Some(Uuid::new_v4()), Decimal::from(3))
        .await;
    assert!(matches!(repeat, Err(AppError::Conflict(_))));
    assert_eq!(f.coupons.get_coupon("WELCOME").await.unwrap().used_count, 1);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 4).await;
    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 4)], None))
        .await
        .unwrap();

    let first = f.orders.cancel(order.id).await.unwrap();
    let second = f.orders.cancel(order.id).await.unwrap();

    assert_eq!(first.cancelled_at, second.cancelled_at);
    assert_eq!(f.store.product_stock(mug.id).await, Some(4));
    assert_eq!(f.store.movements_for(mug.id).await.len(), 2);
}

#[tokio::test]
async fn test_shipped_order_cannot_be_cancelled() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 4).await;
    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();

    f.orders
        .update_status(
            order.id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Shipped),
                payment_status: None,
            },
        )
        .await
        .unwrap();

    let result = f.orders.cancel(order.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(f.store.product_stock(mug.id).await, Some(3));
}

#[tokio::test]
async fn test_status_timestamps_set_once() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 4).await;
    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();

    let ship = UpdateOrderRequest {
        status: Some(OrderStatus::Shipped),
        payment_status: None,
    };
    let shipped = f.orders.update_status(order.id, ship.clone()).await.unwrap();
    let shipped_at = shipped.shipped_at;
    assert!(shipped_at.is_some());

    let again = f.orders.update_status(order.id, ship).await.unwrap();
    assert_eq!(again.shipped_at, shipped_at);

    let delivered = f
        .orders
        .update_status(
            order.id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Delivered),
                payment_status: Some(PaymentStatus::Paid),
            },
        )
        .await
        .unwrap();
    assert!(delivered.delivered_at.is_some());
    assert_eq!(delivered.shipped_at, shipped_at);
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_status_cancelled_restores_stock() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 4).await;
    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 2)], None))
        .await
        .unwrap();

    let cancelled = f
        .orders
        .update_status(
            order.id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Cancelled),
                payment_status: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(f.store.product_stock(mug.id).await, Some(4));

    let reopen = f
        .orders
        .update_status(
            order.id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Processing),
                payment_status: None,
            },
        )
        .await;
    assert!(matches!(reopen, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let f = setup().await;
    let result = f
        .orders
        .update_status(
            Uuid::new_v4(),
            UpdateOrderRequest {
                status: None,
                payment_status: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_order_queries() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 10).await;
    let first = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();
    let second = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();
    f.orders.cancel(first.id).await.unwrap();

    let by_number = f.orders.get_order_by_number(&second.order_number).await.unwrap();
    assert_eq!(by_number.id, second.id);
    assert_eq!(f.orders.get_order(first.id).await.unwrap().status, OrderStatus::Cancelled);
    assert!(matches!(
        f.orders.get_order(Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));

    let page = f
        .orders
        .list_orders(ListOrdersQuery {
            status: None,
            user_id: Some(f.user_id),
            page: Some(1),
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.has_more);
    assert_eq!(page.items[0].id, second.id);

    let cancelled = f
        .orders
        .list_orders(ListOrdersQuery {
            status: Some(OrderStatus::Cancelled),
            user_id: None,
            page: None,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(cancelled.total, 1);
    assert_eq!(cancelled.items[0].id, first.id);
}

#[tokio::test]
async fn test_user_order_stats_count_paid_orders() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(50), 10).await;
    let paid = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();
    f.orders
        .place_order(f.user_id, request(&[(mug.id, 1)], None))
        .await
        .unwrap();
    f.store.set_payment_status(paid.id, PaymentStatus::Paid).await;

    let stats = f.orders.get_user_order_stats(f.user_id).await.unwrap();

    assert_eq!(stats.paid_order_count, 1);
    assert_eq!(stats.total_spent, paid.total_amount);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 3).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let orders = f.orders.clone();
            let user_id = f.user_id;
            let body = request(&[(mug.id, 1)], None);
            tokio::spawn(async move { orders.place_order(user_id, body).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppError::Conflict(_))));
    assert_eq!(f.store.product_stock(mug.id).await, Some(0));
    assert_eq!(f.store.order_count().await, 3);
}

#[test]
fn test_totals_clamp_discount() {
    let policy = PricingPolicy::default();
    let totals = OrderTotals::compute(&policy, Decimal::from(10), Decimal::from(1000), false);

    assert_eq!(totals.total_amount, Decimal::ZERO);
    assert_eq!(
        totals.discount_amount,
        totals.subtotal + totals.tax_amount + totals.shipping_cost
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    SaleMovement,
    CouponUsage,
}

/// Store that fails one kind of write and otherwise defers to memory.
struct FaultyStore {
    inner: MemoryStore,
    fault: Fault,
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fault: Fault,
}

fn injected() -> AppError {
    AppError::Internal("injected write failure".to_string())
}

#[async_trait]
impl CommerceStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, AppError> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fault: self.fault,
        }))
    }
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool, AppError> {
        self.inner.user_exists(user_id).await
    }

    async fn find_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        self.inner.find_product(product_id).await
    }

    async fn lock_product(&mut self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        self.inner.lock_product(product_id).await
    }

    async fn set_product_stock(&mut self, product_id: Uuid, stock: i32) -> Result<(), AppError> {
        self.inner.set_product_stock(product_id, stock).await
    }

    async fn inventory_value(&mut self) -> Result<InventoryValue, AppError> {
        self.inner.inventory_value().await
    }

    async fn insert_movement(
        &mut self,
        movement: NewInventoryMovement,
    ) -> Result<InventoryMovement, AppError> {
        if self.fault == Fault::SaleMovement && movement.movement_type == MovementType::Sale {
            return Err(injected());
        }
        self.inner.insert_movement(movement).await
    }

    async fn movements_since(
        &mut self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        self.inner.movements_since(product_id, since).await
    }

    async fn last_movement_before(
        &mut self,
        product_id: Uuid,
        before: DateTime<Utc>,
    ) -> Result<Option<InventoryMovement>, AppError> {
        self.inner.last_movement_before(product_id, before).await
    }

    async fn recent_movements(
        &mut self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        self.inner.recent_movements(product_id, limit).await
    }

    async fn upsert_alert(&mut self, alert: NewStockAlert) -> Result<StockAlert, AppError> {
        self.inner.upsert_alert(alert).await
    }

    async fn find_alert(&mut self, alert_id: Uuid) -> Result<Option<StockAlert>, AppError> {
        self.inner.find_alert(alert_id).await
    }

    async fn active_alerts_for_product(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockAlert>, AppError> {
        self.inner.active_alerts_for_product(product_id).await
    }

    async fn triggered_alerts(&mut self) -> Result<Vec<StockAlert>, AppError> {
        self.inner.triggered_alerts().await
    }

    async fn save_alert(&mut self, alert: &StockAlert) -> Result<(), AppError> {
        self.inner.save_alert(alert).await
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, AppError> {
        self.inner.order_number_exists(order_number).await
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order, AppError> {
        self.inner.insert_order(order).await
    }

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        self.inner.find_order(order_id).await
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        self.inner.lock_order(order_id).await
    }

    async fn find_order_by_number(&mut self, order_number: &str) -> Result<Option<Order>, AppError> {
        self.inner.find_order_by_number(order_number).await
    }

    async fn save_order_status(&mut self, order: &Order) -> Result<(), AppError> {
        self.inner.save_order_status(order).await
    }

    async fn list_orders(
        &mut self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), AppError> {
        self.inner.list_orders(filter, pagination).await
    }

    async fn count_user_orders(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        self.inner.count_user_orders(user_id).await
    }

    async fn paid_order_stats(&mut self, user_id: Uuid) -> Result<UserOrderStats, AppError> {
        self.inner.paid_order_stats(user_id).await
    }

    async fn insert_coupon(&mut self, coupon: NewCoupon) -> Result<Coupon, AppError> {
        self.inner.insert_coupon(coupon).await
    }

    async fn find_coupon_by_code(&mut self, code: &str) -> Result<Option<Coupon>, AppError> {
        self.inner.find_coupon_by_code(code).await
    }

    async fn lock_coupon(&mut self, coupon_id: Uuid) -> Result<Option<Coupon>, AppError> {
        self.inner.lock_coupon(coupon_id).await
    }

    async fn count_coupon_usage_by_user(
        &mut self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        self.inner.count_coupon_usage_by_user(coupon_id, user_id).await
    }

    async fn find_coupon_usage_for_order(
        &mut self,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<CouponUsage>, AppError> {
        self.inner.find_coupon_usage_for_order(coupon_id, order_id).await
    }

    async fn insert_coupon_usage(&mut self, usage: NewCouponUsage) -> Result<CouponUsage, AppError> {
        if self.fault == Fault::CouponUsage {
            return Err(injected());
        }
        self.inner.insert_coupon_usage(usage).await
    }

    async fn increment_coupon_usage(&mut self, coupon_id: Uuid) -> Result<Coupon, AppError> {
        self.inner.increment_coupon_usage(coupon_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.inner.rollback().await
    }
}

fn faulty_orders(f: &Fixture, fault: Fault) -> OrderService {
    let store: SharedStore = Arc::new(FaultyStore {
        inner: f.store.clone(),
        fault,
    });
    OrderService::new(store, PricingPolicy::default())
}

#[tokio::test]
async fn test_failed_sale_movement_rolls_back_order() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 5).await;
    let plate = product(&f.store, Decimal::from(4), 5).await;
    let orders = faulty_orders(&f, Fault::SaleMovement);

    let result = orders
        .place_order(f.user_id, request(&[(mug.id, 2), (plate.id, 1)], None))
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(f.store.order_count().await, 0);
    assert_eq!(f.store.product_stock(mug.id).await, Some(5));
    assert_eq!(f.store.product_stock(plate.id).await, Some(5));
    assert!(f.store.movements_for(mug.id).await.is_empty());
    assert!(f.store.movements_for(plate.id).await.is_empty());
}

#[tokio::test]
async fn test_failed_coupon_usage_rolls_back_order() {
    let f = setup().await;
    let mug = product(&f.store, Decimal::from(10), 5).await;
    let save = f
        .coupons
        .create_coupon(coupon_terms("SAVE2", CouponType::FixedAmount, Decimal::from(2)))
        .await
        .unwrap();
    let orders = faulty_orders(&f, Fault::CouponUsage);

    let result = orders
        .place_order(f.user_id, request(&[(mug.id, 3)], Some("SAVE2")))
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(f.store.order_count().await, 0);
    assert_eq!(f.store.product_stock(mug.id).await, Some(5));
    assert!(f.store.movements_for(mug.id).await.is_empty());
    assert!(f.store.coupon_usages(save.id).await.is_empty());
    assert_eq!(f.coupons.get_coupon("SAVE2").await.unwrap().used_count, 0);

    let order = f
        .orders
        .place_order(f.user_id, request(&[(mug.id, 3)], Some("SAVE2")))
        .await
        .unwrap();
    assert_eq!(order.discount_amount, Decimal::from(2));
}
