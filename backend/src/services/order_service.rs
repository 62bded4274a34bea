use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use storefront_shared::{
    ListOrdersQuery, MovementReason, MovementType, OrderStatus, PlaceOrderRequest,
    UpdateOrderRequest, ORDER_NUMBER_MAX_ATTEMPTS,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PricingPolicy;
use crate::error::AppError;
use crate::models::{
    CouponLine, NewOrder, NewOrderItem, Order, OrderFilter, Page, Pagination, UserOrderStats,
};
use crate::services::coupon_service::{apply_in, validate_in};
use crate::services::inventory_service::{record_movement_in, MovementCommand};
use crate::store::{SharedStore, StoreTransaction};
use crate::utils::{generate_order_number, round_money};

#[cfg(test)]
mod tests;

const ORDER_REFERENCE: &str = "order";

/// Amounts charged for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Tax and shipping from the policy, then the discount clamped so the
    /// total never goes below zero.
    pub fn compute(
        policy: &PricingPolicy,
        subtotal: Decimal,
        discount: Decimal,
        waive_shipping: bool,
    ) -> Self {
        let tax_amount = round_money(subtotal * policy.tax_rate);
        let shipping_cost = if waive_shipping || subtotal > policy.free_shipping_threshold {
            Decimal::ZERO
        } else {
            policy.shipping_fee
        };

        let gross = subtotal + tax_amount + shipping_cost;
        let discount_amount = discount.max(Decimal::ZERO).min(gross);

        Self {
            subtotal,
            tax_amount,
            shipping_cost,
            discount_amount,
            total_amount: gross - discount_amount,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: SharedStore,
    pricing: PricingPolicy,
}

impl OrderService {
    pub fn new(store: SharedStore, pricing: PricingPolicy) -> Self {
        Self { store, pricing }
    }

    /// Place an order as one unit of work.
    ///
    /// Stock is checked and decremented, the order and its items persisted,
    /// one sale movement written per product and the coupon usage recorded.
    /// Any failure leaves nothing behind.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        request: PlaceOrderRequest,
    ) -> Result<Order, AppError> {
        let lines = merge_lines(&request)?;
        let mut tx = self.store.begin().await?;

        if !tx.user_exists(user_id).await? {
            return Err(AppError::user_not_found(user_id));
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut coupon_lines = Vec::with_capacity(lines.len());
        for (product_id, quantity) in &lines {
            let product = tx
                .lock_product(*product_id)
                .await?
                .ok_or_else(|| AppError::product_unavailable(*product_id))?;

            if !product.is_active {
                warn!("Order rejected: product {} is inactive", product.id);
                return Err(AppError::product_unavailable(product.id));
            }
            if product.stock < *quantity {
                warn!(
                    "Order rejected: product {} has {} in stock, {} requested",
                    product.id, product.stock, quantity
                );
                return Err(AppError::insufficient_stock(product.id, product.stock, *quantity));
            }

            items.push(NewOrderItem {
                product_id: product.id,
                quantity: *quantity,
                price: product.price,
                subtotal: product.price * Decimal::from(*quantity),
            });
            coupon_lines.push(CouponLine {
                product_id: product.id,
                category_id: product.category_id,
            });
        }

        let subtotal: Decimal = items.iter().map(|item| item.subtotal).sum();
        let now = Utc::now();

        let coupon_code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let coupon = match coupon_code {
            Some(code) => {
                match validate_in(tx.as_mut(), code, user_id, subtotal, &coupon_lines, now).await? {
                    Ok(accepted) => Some(accepted),
                    Err(rejection) => {
                        warn!("Order rejected: coupon {} for user {}: {}", code, user_id, rejection);
                        return Err(AppError::invalid_coupon(rejection));
                    }
                }
            }
            None => None,
        };

        let (discount, waive_shipping) = coupon
            .as_ref()
            .map_or((Decimal::ZERO, false), |(c, d)| (*d, c.waives_shipping()));
        let totals = OrderTotals::compute(&self.pricing, subtotal, discount, waive_shipping);

        let order_number = allocate_order_number(tx.as_mut(), now).await?;
        let order = tx
            .insert_order(NewOrder {
                id: Uuid::new_v4(),
                order_number,
                user_id,
                subtotal: totals.subtotal,
                tax_amount: totals.tax_amount,
                shipping_cost: totals.shipping_cost,
                discount_amount: totals.discount_amount,
                total_amount: totals.total_amount,
                coupon_code: coupon.as_ref().map(|(c, _)| c.code.clone()),
                shipping: request.shipping,
                items,
            })
            .await?;

        for item in &order.items {
            let mut command = MovementCommand::new(
                item.product_id,
                MovementType::Sale,
                MovementReason::OrderSale,
                -item.quantity,
            )
            .referencing(ORDER_REFERENCE, order.id);
            command.price = Some(item.price);
            command.created_by_id = Some(user_id);

            let movement = record_movement_in(tx.as_mut(), command).await?;
            if movement.new_stock != movement.previous_stock - item.quantity {
                return Err(AppError::Internal(format!(
                    "Stock for product {} moved {} -> {} on a sale of {}",
                    item.product_id, movement.previous_stock, movement.new_stock, item.quantity
                )));
            }
        }

        if let Some((coupon, _)) = &coupon {
            apply_in(tx.as_mut(), coupon.id, user_id, Some(order.id), totals.discount_amount)
                .await?;
        }

        tx.commit().await?;

        info!(
            "Order {} placed by user {}: {} items, total {}",
            order.order_number,
            user_id,
            order.items.len(),
            order.total_amount
        );

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        let mut tx = self.store.begin().await?;
        let order = tx.find_order(order_id).await?;
        tx.commit().await?;

        order.ok_or_else(|| AppError::order_not_found(order_id))
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order, AppError> {
        let mut tx = self.store.begin().await?;
        let order = tx.find_order_by_number(order_number).await?;
        tx.commit().await?;

        order.ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_number)))
    }

    /// Newest first, filtered by status and owner
    pub async fn list_orders(&self, query: ListOrdersQuery) -> Result<Page<Order>, AppError> {
        let pagination = Pagination::page(query.page, query.limit);
        let filter = OrderFilter {
            status: query.status,
            user_id: query.user_id,
        };

        let mut tx = self.store.begin().await?;
        let (orders, total) = tx.list_orders(&filter, &pagination).await?;
        tx.commit().await?;

        debug!("Listed {} of {} orders", orders.len(), total);
        Ok(Page::new(orders, total, pagination))
    }

    /// Change status and/or payment status.
    ///
    /// Moving to `cancelled` restores stock exactly as [`cancel`] does.
    /// `shipped_at` and `delivered_at` are stamped the first time only.
    ///
    /// [`cancel`]: OrderService::cancel
    pub async fn update_status(
        &self,
        order_id: Uuid,
        update: UpdateOrderRequest,
    ) -> Result<Order, AppError> {
        if update.status.is_none() && update.payment_status.is_none() {
            return Err(AppError::Validation(
                "Provide status or payment_status".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        let now = Utc::now();

        match update.status {
            Some(OrderStatus::Cancelled) => {
                cancel_in(tx.as_mut(), &mut order, now).await?;
            }
            Some(status) if order.status == OrderStatus::Cancelled => {
                return Err(AppError::Conflict(format!(
                    "Order {} is cancelled and cannot move to {}",
                    order.order_number, status
                )));
            }
            Some(status) => {
                order.status = status;
                match status {
                    OrderStatus::Shipped if order.shipped_at.is_none() => {
                        order.shipped_at = Some(now);
                    }
                    OrderStatus::Delivered if order.delivered_at.is_none() => {
                        order.delivered_at = Some(now);
                    }
                    _ => {}
                }
            }
            None => {}
        }

        if let Some(payment_status) = update.payment_status {
            order.payment_status = payment_status;
        }

        tx.save_order_status(&order).await?;
        let saved = tx
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        tx.commit().await?;

        info!(
            "Order {} now {} / {}",
            saved.order_number, saved.status, saved.payment_status
        );

        Ok(saved)
    }

    /// Cancel an order and return its items to stock.
    ///
    /// Cancelling an already-cancelled order changes nothing.
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, AppError> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;

        if !cancel_in(tx.as_mut(), &mut order, Utc::now()).await? {
            tx.rollback().await?;
            return Ok(order);
        }

        tx.save_order_status(&order).await?;
        tx.commit().await?;

        info!("Order {} cancelled", order.order_number);
        Ok(order)
    }

    pub async fn get_user_order_stats(&self, user_id: Uuid) -> Result<UserOrderStats, AppError> {
        let mut tx = self.store.begin().await?;
        let stats = tx.paid_order_stats(user_id).await?;
        tx.commit().await?;
        Ok(stats)
    }
}

/// Collapse repeated products into one line each, ordered by product id so
/// concurrent orders lock rows in the same sequence.
fn merge_lines(request: &PlaceOrderRequest) -> Result<Vec<(Uuid, i32)>, AppError> {
    if request.items.is_empty() {
        return Err(AppError::Validation("Order must contain at least one item".to_string()));
    }

    let mut lines: Vec<(Uuid, i32)> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "Quantity for product {} must be positive",
                item.product_id
            )));
        }

        match lines.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
                    AppError::Validation(format!("Quantity for product {} is too large", item.product_id))
                })?;
            }
            None => lines.push((item.product_id, item.quantity)),
        }
    }

    lines.sort_by_key(|(id, _)| *id);
    Ok(lines)
}

async fn allocate_order_number(
    tx: &mut dyn StoreTransaction,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    for _ in 0..ORDER_NUMBER_MAX_ATTEMPTS {
        let candidate = generate_order_number(now);
        if !tx.order_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        debug!("Order number {} already taken, retrying", candidate);
    }

    Err(AppError::Internal(
        "Could not allocate a unique order number".to_string(),
    ))
}

/// Returns `false` when the order was already cancelled.
async fn cancel_in(
    tx: &mut dyn StoreTransaction,
    order: &mut Order,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    if order.status == OrderStatus::Cancelled {
        debug!("Order {} already cancelled", order.order_number);
        return Ok(false);
    }

    if !order.status.is_cancellable() {
        return Err(AppError::order_not_cancellable(&order.order_number, order.status));
    }

    for item in &order.items {
        let command = MovementCommand::new(
            item.product_id,
            MovementType::Return,
            MovementReason::OrderCancellation,
            item.quantity,
        )
        .referencing(ORDER_REFERENCE, order.id);

        record_movement_in(tx, command).await?;
    }

    order.status = OrderStatus::Cancelled;
    order.cancelled_at = Some(now);
    Ok(true)
}
