use actix_web::{error::InternalError, web, HttpResponse};

use crate::error::AppError;

pub mod coupons;
pub mod health;
pub mod inventory;
pub mod orders;

/// Register every route plus extractor error handlers that answer in the
/// standard envelope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        let message = format!("Invalid request body: {}", err);
        InternalError::from_response(err, rejection(message)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        let message = format!("Invalid query string: {}", err);
        InternalError::from_response(err, rejection(message)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        let message = format!("Invalid path parameter: {}", err);
        InternalError::from_response(err, rejection(message)).into()
    }))
    .service(health::health_check)
    // Orders
    .service(orders::place_order)
    .service(orders::list_orders)
    .service(orders::my_order_stats)
    .service(orders::get_order_by_number)
    .service(orders::get_order)
    .service(orders::update_order)
    .service(orders::cancel_order)
    // Inventory
    .service(inventory::record_movement)
    .service(inventory::adjust_inventory)
    .service(inventory::stock_history)
    .service(inventory::list_movements)
    .service(inventory::inventory_value)
    .service(inventory::upsert_alert)
    .service(inventory::list_alerts)
    .service(inventory::dismiss_alert)
    // Coupons
    .service(coupons::validate_coupon)
    .service(coupons::create_coupon)
    .service(coupons::get_coupon);
}

fn rejection(message: String) -> HttpResponse {
    actix_web::ResponseError::error_response(&AppError::Validation(message))
}
