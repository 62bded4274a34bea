use actix_web::{get, post, web, HttpResponse};
use storefront_shared::{
    ApiResponse, CreateCouponRequest, ValidateCouponRequest, SUCCESS_COUPON_CREATED,
    SUCCESS_COUPON_FOUND, SUCCESS_COUPON_VALID,
};
use tracing::info;

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::CouponService;
use crate::utils::{validate_all, validate_request};

/// Check a coupon against a prospective order. A rejected coupon is still a
/// successful call; the verdict is in `data.is_valid`.
#[post("/coupons/validate")]
pub async fn validate_coupon(
    user: AuthenticatedUser,
    request: web::Json<ValidateCouponRequest>,
    coupon_service: web::Data<CouponService>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*request)?;
    validate_all(&request.items)?;

    let validation = coupon_service
        .validate(&request.code, user.user_id, request.order_total, &request.items)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_COUPON_VALID, validation)))
}

#[post("/coupons")]
pub async fn create_coupon(
    request: web::Json<CreateCouponRequest>,
    coupon_service: web::Data<CouponService>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    validate_request(&request)?;

    info!("Creating coupon {}", request.code);
    let coupon = coupon_service.create_coupon(request).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(SUCCESS_COUPON_CREATED, coupon)))
}

#[get("/coupons/{code}")]
pub async fn get_coupon(
    path: web::Path<String>,
    coupon_service: web::Data<CouponService>,
) -> Result<HttpResponse, AppError> {
    let coupon = coupon_service.get_coupon(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_COUPON_FOUND, coupon)))
}
