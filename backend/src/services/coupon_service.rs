use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use storefront_shared::{CouponType, CreateCouponRequest, OrderLineRequest, MAX_MONEY_AMOUNT};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coupon::normalize_code;
use crate::models::{Coupon, CouponLine, CouponUsage, NewCoupon, NewCouponUsage};
use crate::store::{SharedStore, StoreTransaction};


/// Why a coupon was turned down. Checks run in declaration order and the
/// first failing one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    NotFound,
    Inactive,
    OutsideValidity,
    BelowMinimum(Decimal),
    PerUserLimitReached,
    UsageLimitReached,
    FirstOrderOnly,
    NotApplicable,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::NotFound => write!(f, "Coupon not found"),
            CouponRejection::Inactive => write!(f, "Coupon is not active"),
            CouponRejection::OutsideValidity => write!(f, "Coupon has expired or is not yet valid"),
            CouponRejection::BelowMinimum(minimum) => {
                write!(f, "Minimum order amount of {} required", minimum)
            }
            CouponRejection::PerUserLimitReached => write!(f, "Coupon per-user limit reached"),
            CouponRejection::UsageLimitReached => write!(f, "Coupon usage limit reached"),
            CouponRejection::FirstOrderOnly => {
                write!(f, "Coupon is only valid on a customer's first order")
            }
            CouponRejection::NotApplicable => {
                write!(f, "Coupon is not applicable to items in this order")
            }
        }
    }
}

/// Outcome of a coupon check: the coupon and the discount it grants, or the
/// reason it was turned down.
pub type CouponDecision = Result<(Coupon, Decimal), CouponRejection>;

#[derive(Debug, Clone, Serialize)]
pub struct CouponValidation {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub discount_amount: Option<Decimal>,
    pub coupon: Option<Coupon>,
}

impl From<CouponDecision> for CouponValidation {
    fn from(decision: CouponDecision) -> Self {
        match decision {
            Ok((coupon, discount)) => Self {
                is_valid: true,
                reason: None,
                discount_amount: Some(discount),
                coupon: Some(coupon),
            },
            Err(rejection) => Self {
                is_valid: false,
                reason: Some(rejection.to_string()),
                discount_amount: None,
                coupon: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct CouponService {
    store: SharedStore,
}

impl CouponService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Check a coupon against an order without recording anything
    pub async fn validate(
        &self,
        code: &str,
        user_id: Uuid,
        order_total: Decimal,
        items: &[OrderLineRequest],
    ) -> Result<CouponValidation, AppError> {
        check_order_total(order_total)?;
        let mut tx = self.store.begin().await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = tx
                .find_product(item.product_id)
                .await?
                .ok_or_else(|| AppError::product_not_found(item.product_id))?;
            lines.push(CouponLine {
                product_id: product.id,
                category_id: product.category_id,
            });
        }

        let decision = validate_in(tx.as_mut(), code, user_id, order_total, &lines, Utc::now()).await?;
        tx.commit().await?;

        if let Err(rejection) = &decision {
            debug!("Coupon {} rejected for user {}: {}", code, user_id, rejection);
        }

        Ok(decision.into())
    }

    /// Record that a coupon was used on an order
    pub async fn apply_coupon(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Option<Uuid>,
        discount_amount: Decimal,
    ) -> Result<CouponUsage, AppError> {
        let mut tx = self.store.begin().await?;
        let usage = apply_in(tx.as_mut(), coupon_id, user_id, order_id, discount_amount).await?;
        tx.commit().await?;
        Ok(usage)
    }

    pub async fn create_coupon(&self, request: CreateCouponRequest) -> Result<Coupon, AppError> {
        check_coupon_terms(&request)?;

        let mut tx = self.store.begin().await?;
        let coupon = tx
            .insert_coupon(NewCoupon {
                code: normalize_code(&request.code),
                description: request.description,
                coupon_type: request.coupon_type,
                value: request.value,
                minimum_order_amount: request.minimum_order_amount,
                maximum_discount_amount: request.maximum_discount_amount,
                usage_limit: request.usage_limit,
                usage_limit_per_user: request.usage_limit_per_user,
                valid_from: request.valid_from,
                valid_until: request.valid_until,
                applicable_categories: request.applicable_categories,
                applicable_products: request.applicable_products,
                excluded_categories: request.excluded_categories,
                excluded_products: request.excluded_products,
                is_first_time_user_only: request.is_first_time_user_only,
            })
            .await?;
        tx.commit().await?;

        info!("Created {} coupon {}", coupon.coupon_type, coupon.code);
        Ok(coupon)
    }

    pub async fn get_coupon(&self, code: &str) -> Result<Coupon, AppError> {
        let mut tx = self.store.begin().await?;
        let coupon = tx.find_coupon_by_code(code).await?;
        tx.commit().await?;

        coupon.ok_or_else(|| AppError::NotFound(format!("Coupon {} not found", normalize_code(code))))
    }
}

fn check_order_total(order_total: Decimal) -> Result<(), AppError> {
    if order_total < Decimal::ZERO {
        return Err(AppError::Validation(
            "order_total must not be negative".to_string(),
        ));
    }
    if order_total > MAX_MONEY_AMOUNT {
        return Err(AppError::Validation(format!(
            "order_total must not exceed {}",
            MAX_MONEY_AMOUNT
        )));
    }
    Ok(())
}

fn check_coupon_terms(request: &CreateCouponRequest) -> Result<(), AppError> {
    if request.valid_until <= request.valid_from {
        return Err(AppError::Validation(
            "valid_until must be after valid_from".to_string(),
        ));
    }

    if request.value < Decimal::ZERO {
        return Err(AppError::Validation("value must not be negative".to_string()));
    }

    if request.coupon_type == CouponType::Percentage
        && (request.value <= Decimal::ZERO || request.value > Decimal::ONE_HUNDRED)
    {
        return Err(AppError::Validation(
            "Percentage coupons need a value between 0 and 100".to_string(),
        ));
    }

    let negative = |amount: Option<Decimal>| amount.map_or(false, |a| a < Decimal::ZERO);
    if negative(request.minimum_order_amount) || negative(request.maximum_discount_amount) {
        return Err(AppError::Validation(
            "Coupon amounts must not be negative".to_string(),
        ));
    }

    Ok(())
}

/// Run the coupon checks inside an open unit of work.
///
/// Order: exists, active, validity window, minimum amount, per-user limit,
/// global limit, first-order restriction, applicability.
pub(crate) async fn validate_in(
    tx: &mut dyn StoreTransaction,
    code: &str,
    user_id: Uuid,
    order_total: Decimal,
    lines: &[CouponLine],
    now: DateTime<Utc>,
) -> Result<CouponDecision, AppError> {
    let coupon = match tx.find_coupon_by_code(code).await? {
        Some(coupon) => coupon,
        None => return Ok(Err(CouponRejection::NotFound)),
    };

    if !coupon.is_active {
        return Ok(Err(CouponRejection::Inactive));
    }

    if !coupon.is_within_validity(now) {
        return Ok(Err(CouponRejection::OutsideValidity));
    }

    if let Some(minimum) = coupon.minimum_order_amount {
        if order_total < minimum {
            return Ok(Err(CouponRejection::BelowMinimum(minimum)));
        }
    }

    if let Some(limit) = coupon.usage_limit_per_user {
        let used = tx.count_coupon_usage_by_user(coupon.id, user_id).await?;
        if used >= i64::from(limit) {
            return Ok(Err(CouponRejection::PerUserLimitReached));
        }
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Ok(Err(CouponRejection::UsageLimitReached));
        }
    }

    if coupon.is_first_time_user_only && tx.count_user_orders(user_id).await? > 0 {
        return Ok(Err(CouponRejection::FirstOrderOnly));
    }

    if !coupon.is_applicable_to(lines) {
        return Ok(Err(CouponRejection::NotApplicable));
    }

    let discount = coupon.discount_for(order_total)?;
    Ok(Ok((coupon, discount)))
}

/// Record a usage and bump the coupon's counter inside an open unit of work.
///
/// The coupon row is locked first and the limits and first-order restriction
/// re-checked, so concurrent redemptions cannot overshoot them. The order the
/// coupon is applied to does not count against the first-order restriction. Applying the same coupon to the same
/// order twice returns the existing usage.
pub(crate) async fn apply_in(
    tx: &mut dyn StoreTransaction,
    coupon_id: Uuid,
    user_id: Uuid,
    order_id: Option<Uuid>,
    discount_amount: Decimal,
) -> Result<CouponUsage, AppError> {
    let coupon = tx
        .lock_coupon(coupon_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Coupon {} not found", coupon_id)))?;

    if let Some(order_id) = order_id {
        if let Some(existing) = tx.find_coupon_usage_for_order(coupon_id, order_id).await? {
            debug!("Coupon {} already applied to order {}", coupon.code, order_id);
            return Ok(existing);
        }
    }

    if let Some(limit) = coupon.usage_limit_per_user {
        if tx.count_coupon_usage_by_user(coupon_id, user_id).await? >= i64::from(limit) {
            warn!("Per-user limit hit while applying coupon {}", coupon.code);
            return Err(AppError::Conflict(CouponRejection::PerUserLimitReached.to_string()));
        }
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            warn!("Usage limit hit while applying coupon {}", coupon.code);
            return Err(AppError::Conflict(CouponRejection::UsageLimitReached.to_string()));
        }
    }

    if coupon.is_first_time_user_only {
        let current = match order_id {
            Some(order_id) => tx
                .find_order(order_id)
                .await?
                .map_or(0, |order| i64::from(order.user_id == user_id)),
            None => 0,
        };
        if tx.count_user_orders(user_id).await? - current > 0 {
            warn!("First-order coupon {} applied to a repeat order", coupon.code);
            return Err(AppError::Conflict(CouponRejection::FirstOrderOnly.to_string()));
        }
    }

    let usage = tx
        .insert_coupon_usage(NewCouponUsage {
            user_id,
            coupon_id,
            order_id,
            discount_amount,
        })
        .await?;
    let coupon = tx.increment_coupon_usage(coupon_id).await?;

    info!(
        "Coupon {} applied for user {} ({} uses)",
        coupon.code, user_id, coupon.used_count
    );

    Ok(usage)
}
