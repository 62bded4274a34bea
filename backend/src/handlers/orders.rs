use actix_web::{get, post, put, web, HttpResponse};
use storefront_shared::{
    ApiResponse, ListOrdersQuery, PlaceOrderRequest, UpdateOrderRequest, SUCCESS_ORDERS_LISTED,
    SUCCESS_ORDER_CANCELLED, SUCCESS_ORDER_FOUND, SUCCESS_ORDER_PLACED, SUCCESS_ORDER_STATS,
    SUCCESS_ORDER_UPDATED,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::OrderService;
use crate::utils::{validate_all, validate_request};

/// Place an order for the calling user
#[post("/orders")]
pub async fn place_order(
    user: AuthenticatedUser,
    request: web::Json<PlaceOrderRequest>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    validate_request(&request)?;
    validate_all(&request.items)?;
    validate_request(&request.shipping)?;

    info!(
        "User {} placing order with {} lines",
        user.user_id,
        request.items.len()
    );

    let order = order_service.place_order(user.user_id, request).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(SUCCESS_ORDER_PLACED, order)))
}

#[get("/orders")]
pub async fn list_orders(
    query: web::Query<ListOrdersQuery>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    validate_request(&query)?;

    let page = order_service.list_orders(query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDERS_LISTED, page)))
}

/// Paid order count and spend for the calling user
#[get("/orders/stats/me")]
pub async fn my_order_stats(
    user: AuthenticatedUser,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let stats = order_service.get_user_order_stats(user.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDER_STATS, stats)))
}

#[get("/orders/number/{order_number}")]
pub async fn get_order_by_number(
    path: web::Path<String>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let order = order_service.get_order_by_number(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDER_FOUND, order)))
}

#[get("/orders/{order_id}")]
pub async fn get_order(
    path: web::Path<Uuid>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    debug!("Fetching order {}", order_id);

    let order = order_service.get_order(order_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDER_FOUND, order)))
}

#[put("/orders/{order_id}")]
pub async fn update_order(
    path: web::Path<Uuid>,
    request: web::Json<UpdateOrderRequest>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let order = order_service
        .update_status(path.into_inner(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDER_UPDATED, order)))
}

#[put("/orders/{order_id}/cancel")]
pub async fn cancel_order(
    path: web::Path<Uuid>,
    order_service: web::Data<OrderService>,
) -> Result<HttpResponse, AppError> {
    let order = order_service.cancel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ORDER_CANCELLED, order)))
}
