use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use storefront_shared::{OrderStatus, PaymentStatus, ShippingInfo};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Pagination;

const ORDER_COLUMNS: &str = r#"
    id, order_number, user_id, status, payment_status,
    subtotal, tax_amount, shipping_cost, discount_amount, total_amount, coupon_code,
    shipping_full_name, shipping_address_line1, shipping_address_line2, shipping_city,
    shipping_state, shipping_postal_code, shipping_country, shipping_phone,
    shipped_at, delivered_at, cancelled_at, created_at, updated_at
"#;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub shipping_full_name: String,
    pub shipping_address_line1: String,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: String,
    pub shipping_state: Option<String>,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub shipping_phone: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order row plus its lines, ready to be persisted in one unit of work.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub shipping: ShippingInfo,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrderStats {
    pub paid_order_count: i64,
    pub total_spent: Decimal,
}

impl Order {
    /// Insert the order and all of its items
    pub async fn create(conn: &mut PgConnection, new_order: NewOrder) -> Result<Self, AppError> {
        let mut order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, subtotal, tax_amount, shipping_cost,
                discount_amount, total_amount, coupon_code,
                shipping_full_name, shipping_address_line1, shipping_address_line2, shipping_city,
                shipping_state, shipping_postal_code, shipping_country, shipping_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(new_order.id)
        .bind(&new_order.order_number)
        .bind(new_order.user_id)
        .bind(new_order.subtotal)
        .bind(new_order.tax_amount)
        .bind(new_order.shipping_cost)
        .bind(new_order.discount_amount)
        .bind(new_order.total_amount)
        .bind(&new_order.coupon_code)
        .bind(&new_order.shipping.full_name)
        .bind(&new_order.shipping.address_line1)
        .bind(&new_order.shipping.address_line2)
        .bind(&new_order.shipping.city)
        .bind(&new_order.shipping.state)
        .bind(&new_order.shipping.postal_code)
        .bind(&new_order.shipping.country)
        .bind(&new_order.shipping.phone)
        .fetch_one(&mut *conn)
        .await?;

        for item in new_order.items {
            let saved = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, quantity, price, subtotal, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.subtotal)
            .fetch_one(&mut *conn)
            .await?;

            order.items.push(saved);
        }

        Ok(order)
    }

    /// Find order by ID, including items
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Self::with_items(conn, order).await
    }

    /// Find order by ID and lock it for the rest of the transaction
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Self::with_items(conn, order).await
    }

    /// Find order by its human-readable number
    pub async fn find_by_number(
        conn: &mut PgConnection,
        order_number: &str,
    ) -> Result<Option<Self>, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE order_number = $1",
            ORDER_COLUMNS
        ))
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;

        Self::with_items(conn, order).await
    }

    pub async fn number_exists(conn: &mut PgConnection, order_number: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(order_number)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }

    /// Persist status fields and their timestamps
    pub async fn update_status_fields(conn: &mut PgConnection, order: &Order) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, shipped_at = $3, delivered_at = $4,
                cancelled_at = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// List orders newest first, returning the page and the total match count
    pub async fn list(
        conn: &mut PgConnection,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
            AND ($2::uuid IS NULL OR user_id = $2)
            "#,
        )
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_one(&mut *conn)
        .await?;

        let mut orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
            AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            ORDER_COLUMNS
        ))
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&mut *conn)
        .await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find_by_order_ids(conn, &order_ids).await?;
        for order in &mut orders {
            order.items = items.iter().filter(|i| i.order_id == order.id).cloned().collect();
        }

        Ok((orders, total))
    }

    pub async fn count_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    /// Count and revenue of a user's paid orders
    pub async fn paid_stats_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<UserOrderStats, AppError> {
        let (paid_order_count, total_spent): (i64, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_amount), 0)
            FROM orders
            WHERE user_id = $1 AND payment_status = 'paid'
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(UserOrderStats {
            paid_order_count,
            total_spent: total_spent.unwrap_or(Decimal::ZERO),
        })
    }

    async fn with_items(
        conn: &mut PgConnection,
        order: Option<Order>,
    ) -> Result<Option<Self>, AppError> {
        match order {
            Some(mut order) => {
                order.items = OrderItem::find_by_order_ids(conn, &[order.id]).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Check the stored amounts against the total identity
    pub fn totals_are_consistent(&self) -> bool {
        self.total_amount
            == self.subtotal + self.tax_amount + self.shipping_cost - self.discount_amount
            && self.total_amount >= Decimal::ZERO
    }
}

impl OrderItem {
    pub async fn find_by_order_ids(
        conn: &mut PgConnection,
        order_ids: &[Uuid],
    ) -> Result<Vec<Self>, AppError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price, subtotal, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }
}
