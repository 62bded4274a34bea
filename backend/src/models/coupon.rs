use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use storefront_shared::CouponType;
use uuid::Uuid;

use crate::error::AppError;
use crate::utils::money::round_money;

const COUPON_COLUMNS: &str = r#"
    id, code, description, coupon_type, value, minimum_order_amount, maximum_discount_amount,
    usage_limit, usage_limit_per_user, used_count, valid_from, valid_until, is_active,
    applicable_categories, applicable_products, excluded_categories, excluded_products,
    is_first_time_user_only, created_at, updated_at
"#;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub applicable_categories: Vec<Uuid>,
    pub applicable_products: Vec<Uuid>,
    pub excluded_categories: Vec<Uuid>,
    pub excluded_products: Vec<Uuid>,
    pub is_first_time_user_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_order_amount: Option<Decimal>,
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub applicable_categories: Vec<Uuid>,
    pub applicable_products: Vec<Uuid>,
    pub excluded_categories: Vec<Uuid>,
    pub excluded_products: Vec<Uuid>,
    pub is_first_time_user_only: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CouponUsage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coupon_id: Uuid,
    pub order_id: Option<Uuid>,
    pub discount_amount: Decimal,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCouponUsage {
    pub user_id: Uuid,
    pub coupon_id: Uuid,
    pub order_id: Option<Uuid>,
    pub discount_amount: Decimal,
}

/// A line of the order as seen by the applicability rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponLine {
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
}

/// Codes are case-insensitive and stored upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Coupon {
    pub fn is_within_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    pub fn has_allow_lists(&self) -> bool {
        !self.applicable_products.is_empty() || !self.applicable_categories.is_empty()
    }

    /// With allow-lists, at least one line must match one of them and the
    /// deny-lists are not consulted. Without allow-lists the coupon applies
    /// unless a line is deny-listed.
    pub fn is_applicable_to(&self, lines: &[CouponLine]) -> bool {
        if self.has_allow_lists() {
            return lines.iter().any(|line| {
                self.applicable_products.contains(&line.product_id)
                    || line
                        .category_id
                        .map_or(false, |c| self.applicable_categories.contains(&c))
            });
        }

        !lines.iter().any(|line| {
            self.excluded_products.contains(&line.product_id)
                || line
                    .category_id
                    .map_or(false, |c| self.excluded_categories.contains(&c))
        })
    }

    /// Discount granted on an order of `order_total`
    pub fn discount_for(&self, order_total: Decimal) -> Result<Decimal, AppError> {
        let discount = match self.coupon_type {
            CouponType::Percentage => {
                let mut discount = order_total
                    .checked_mul(self.value)
                    .and_then(|amount| amount.checked_div(Decimal::ONE_HUNDRED))
                    .ok_or_else(|| {
                        AppError::Validation(format!("Order total {} is out of range", order_total))
                    })?;
                if let Some(cap) = self.maximum_discount_amount {
                    discount = discount.min(cap);
                }
                round_money(discount)
            }
            CouponType::FixedAmount => self.value.min(order_total),
            CouponType::FreeShipping => Decimal::ZERO,
        };

        Ok(discount.max(Decimal::ZERO))
    }

    pub fn waives_shipping(&self) -> bool {
        matches!(self.coupon_type, CouponType::FreeShipping)
    }

    pub async fn create(conn: &mut PgConnection, coupon: NewCoupon) -> Result<Self, AppError> {
        let saved = sqlx::query_as::<_, Coupon>(&format!(
            r#"
            INSERT INTO coupons (
                id, code, description, coupon_type, value, minimum_order_amount,
                maximum_discount_amount, usage_limit, usage_limit_per_user, valid_from,
                valid_until, applicable_categories, applicable_products, excluded_categories,
                excluded_products, is_first_time_user_only
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&coupon.code)
        .bind(&coupon.description)
        .bind(coupon.coupon_type)
        .bind(coupon.value)
        .bind(coupon.minimum_order_amount)
        .bind(coupon.maximum_discount_amount)
        .bind(coupon.usage_limit)
        .bind(coupon.usage_limit_per_user)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(&coupon.applicable_categories)
        .bind(&coupon.applicable_products)
        .bind(&coupon.excluded_categories)
        .bind(&coupon.excluded_products)
        .bind(coupon.is_first_time_user_only)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e.as_database_error().map(|d| d.is_unique_violation()) {
            Some(true) => AppError::Conflict(format!("Coupon {} already exists", coupon.code)),
            _ => AppError::Database(e),
        })?;

        Ok(saved)
    }

    pub async fn find_by_code(conn: &mut PgConnection, code: &str) -> Result<Option<Self>, AppError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE code = $1",
            COUPON_COLUMNS
        ))
        .bind(normalize_code(code))
        .fetch_optional(&mut *conn)
        .await?;

        Ok(coupon)
    }

    /// Lock the coupon row so usage checks and increments are serialized
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, AppError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE id = $1 FOR UPDATE",
            COUPON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(coupon)
    }

    pub async fn increment_used_count(conn: &mut PgConnection, id: Uuid) -> Result<Self, AppError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r#"
            UPDATE coupons SET used_count = used_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(coupon)
    }
}

impl CouponUsage {
    pub async fn create(conn: &mut PgConnection, usage: NewCouponUsage) -> Result<Self, AppError> {
        let saved = sqlx::query_as::<_, CouponUsage>(
            r#"
            INSERT INTO coupon_usages (id, user_id, coupon_id, order_id, discount_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, coupon_id, order_id, discount_amount, used_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(usage.user_id)
        .bind(usage.coupon_id)
        .bind(usage.order_id)
        .bind(usage.discount_amount)
        .fetch_one(&mut *conn)
        .await?;

        Ok(saved)
    }

    pub async fn count_for_user(
        conn: &mut PgConnection,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    pub async fn find_for_order(
        conn: &mut PgConnection,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let usage = sqlx::query_as::<_, CouponUsage>(
            r#"
            SELECT id, user_id, coupon_id, order_id, discount_amount, used_at
            FROM coupon_usages
            WHERE coupon_id = $1 AND order_id = $2
            "#,
        )
        .bind(coupon_id)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(usage)
    }
}
