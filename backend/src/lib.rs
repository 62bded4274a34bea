//! Order placement, inventory ledger and coupon engine for the storefront.

use actix_web::web;

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use config::PricingPolicy;
use services::{CouponService, InventoryService, OrderService};
use store::SharedStore;

/// Every service the HTTP layer needs, sharing one store
#[derive(Clone)]
pub struct Services {
    pub orders: OrderService,
    pub inventory: InventoryService,
    pub coupons: CouponService,
}

impl Services {
    pub fn new(store: SharedStore, pricing: PricingPolicy) -> Self {
        Self {
            orders: OrderService::new(store.clone(), pricing),
            inventory: InventoryService::new(store.clone()),
            coupons: CouponService::new(store),
        }
    }
}

/// Register services and routes on an actix app
pub fn configure(cfg: &mut web::ServiceConfig, services: &Services) {
    cfg.app_data(web::Data::new(services.orders.clone()))
        .app_data(web::Data::new(services.inventory.clone()))
        .app_data(web::Data::new(services.coupons.clone()))
        .configure(handlers::configure);
}
