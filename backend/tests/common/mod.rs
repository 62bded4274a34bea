#![allow(dead_code)]

use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use storefront_backend::config::PricingPolicy;
use storefront_backend::models::Product;
use storefront_backend::store::MemoryStore;
use storefront_backend::Services;
use uuid::Uuid;

pub struct TestContext {
    pub store: MemoryStore,
    pub services: Services,
    pub user_id: Uuid,
}

pub async fn context() -> TestContext {
    let store = MemoryStore::new();
    let user_id = Uuid::new_v4();
    store.insert_user(user_id).await;
    let services = Services::new(Arc::new(store.clone()), PricingPolicy::default());

    TestContext {
        store,
        services,
        user_id,
    }
}

pub async fn product(ctx: &TestContext, price: Decimal, stock: i32) -> Product {
    ctx.store.insert_product("Notebook", price, stock, None).await
}

pub fn shipping() -> Value {
    json!({
        "full_name": "Grace Hopper",
        "address_line1": "1 Compiler Way",
        "city": "Arlington",
        "postal_code": "22201",
        "country": "US"
    })
}

pub fn order_body(lines: &[(Uuid, i32)], coupon_code: Option<&str>) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product_id, quantity)| json!({ "product_id": product_id, "quantity": quantity }))
        .collect();

    json!({
        "items": items,
        "shipping": shipping(),
        "coupon_code": coupon_code,
    })
}

/// Parse a decimal that was serialized as a JSON number
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_f64()
        .and_then(|f| Decimal::from_f64_retain(f))
        .map(|d| d.round_dp(2))
        .unwrap_or_else(|| panic!("not a decimal: {}", value))
}
