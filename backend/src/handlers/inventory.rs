use actix_web::{get, post, put, web, HttpResponse};
use storefront_shared::{
    AdjustInventoryRequest, ApiResponse, MovementListQuery, RecordMovementRequest,
    StockHistoryQuery, UpsertStockAlertRequest, SUCCESS_ALERTS_LISTED, SUCCESS_ALERT_DISMISSED,
    SUCCESS_ALERT_SAVED, SUCCESS_INVENTORY_ADJUSTED, SUCCESS_INVENTORY_VALUE,
    SUCCESS_MOVEMENTS_LISTED, SUCCESS_MOVEMENT_RECORDED, SUCCESS_STOCK_HISTORY,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::{InventoryService, MovementCommand};
use crate::utils::validate_request;

#[post("/inventory/movements")]
pub async fn record_movement(
    actor: Option<AuthenticatedUser>,
    request: web::Json<RecordMovementRequest>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    validate_request(&request)?;

    let command = MovementCommand::from_request(request, actor.map(|a| a.user_id));
    let movement = inventory_service.record_movement(command).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(SUCCESS_MOVEMENT_RECORDED, movement)))
}

/// Set a product's stock to an absolute level
#[post("/inventory/adjust")]
pub async fn adjust_inventory(
    actor: Option<AuthenticatedUser>,
    request: web::Json<AdjustInventoryRequest>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    validate_request(&request)?;

    let movement = inventory_service
        .adjust_inventory(
            request.product_id,
            request.new_quantity,
            request.reason,
            request.notes,
            actor.map(|a| a.user_id),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_INVENTORY_ADJUSTED, movement)))
}

#[get("/inventory/products/{product_id}/history")]
pub async fn stock_history(
    path: web::Path<Uuid>,
    query: web::Query<StockHistoryQuery>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*query)?;

    let history = inventory_service
        .get_stock_history(path.into_inner(), query.days)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_STOCK_HISTORY, history)))
}

#[get("/inventory/products/{product_id}/movements")]
pub async fn list_movements(
    path: web::Path<Uuid>,
    query: web::Query<MovementListQuery>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*query)?;

    let movements = inventory_service
        .list_movements(path.into_inner(), query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_MOVEMENTS_LISTED, movements)))
}

#[get("/inventory/value")]
pub async fn inventory_value(
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    let value = inventory_service.get_inventory_value().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_INVENTORY_VALUE, value)))
}

#[post("/inventory/alerts")]
pub async fn upsert_alert(
    request: web::Json<UpsertStockAlertRequest>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    validate_request(&*request)?;

    let alert = inventory_service
        .upsert_alert(request.product_id, request.alert_type, request.threshold_quantity)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ALERT_SAVED, alert)))
}

#[get("/inventory/alerts")]
pub async fn list_alerts(
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    let alerts = inventory_service.list_active_alerts().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ALERTS_LISTED, alerts)))
}

#[put("/inventory/alerts/{alert_id}/dismiss")]
pub async fn dismiss_alert(
    path: web::Path<Uuid>,
    inventory_service: web::Data<InventoryService>,
) -> Result<HttpResponse, AppError> {
    let alert = inventory_service.dismiss_alert(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(SUCCESS_ALERT_DISMISSED, alert)))
}
