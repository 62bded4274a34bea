mod common;

use actix_web::{http::StatusCode, test, App};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_backend::middleware::identity::USER_ID_HEADER;

use common::{context, decimal, order_body, product};

fn coupon_body(code: &str, coupon_type: &str, value: f64) -> Value {
    let now = Utc::now();
    json!({
        "code": code,
        "coupon_type": coupon_type,
        "value": value,
        "valid_from": now - Duration::days(1),
        "valid_until": now + Duration::days(30),
    })
}

#[actix_web::test]
async fn test_create_get_and_validate_coupon() {
    let ctx = context().await;
    let headphones = product(&ctx, Decimal::from(50), 10).await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/coupons")
        .set_json(coupon_body("save10", "percentage", 10.0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["code"], json!("SAVE10"));

    let req = test::TestRequest::get().uri("/coupons/SAVE10").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/coupons/validate")
        .insert_header((USER_ID_HEADER, ctx.user_id.to_string()))
        .set_json(json!({
            "code": "save10",
            "order_total": 100,
            "items": [{ "product_id": headphones.id, "quantity": 2 }]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["is_valid"], json!(true));
    assert_eq!(decimal(&body["data"]["discount_amount"]), Decimal::from(10));
}

#[actix_web::test]
async fn test_rejected_coupon_is_reported_not_failed() {
    let ctx = context().await;
    let headphones = product(&ctx, Decimal::from(50), 10).await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/coupons/validate")
        .insert_header((USER_ID_HEADER, ctx.user_id.to_string()))
        .set_json(json!({
            "code": "GHOST",
            "order_total": 100,
            "items": [{ "product_id": headphones.id, "quantity": 1 }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["is_valid"], json!(false));
    assert_eq!(body["data"]["reason"], json!("Coupon not found"));
}

#[actix_web::test]
async fn test_unknown_coupon_and_duplicate_code() {
    let ctx = context().await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::get().uri("/coupons/MISSING").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let req = test::TestRequest::post()
            .uri("/coupons")
            .set_json(coupon_body("TWIN", "fixed_amount", 5.0))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_web::test]
async fn test_order_with_rejected_coupon_is_bad_request() {
    let ctx = context().await;
    let headphones = product(&ctx, Decimal::from(50), 10).await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header((USER_ID_HEADER, ctx.user_id.to_string()))
        .set_json(order_body(&[(headphones.id, 1)], Some("GHOST")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().starts_with("Invalid coupon"));
    assert_eq!(ctx.store.product_stock(headphones.id).await, Some(10));
    assert_eq!(ctx.store.order_count().await, 0);
}

#[actix_web::test]
async fn test_out_of_range_order_total_is_bad_request() {
    let ctx = context().await;
    let headphones = product(&ctx, Decimal::from(50), 10).await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/coupons")
        .set_json(coupon_body("ALLFREE", "percentage", 100.0))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    for order_total in [json!(1e27), json!(-40)] {
        let req = test::TestRequest::post()
            .uri("/coupons/validate")
            .insert_header((USER_ID_HEADER, ctx.user_id.to_string()))
            .set_json(json!({
                "code": "ALLFREE",
                "order_total": order_total,
                "items": [{ "product_id": headphones.id, "quantity": 1 }]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["message"].as_str().unwrap().contains("order_total"));
    }
}

#[actix_web::test]
async fn test_malformed_json_uses_envelope() {
    let ctx = context().await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/coupons")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn test_health() {
    let ctx = context().await;
    let app = test::init_service(
        App::new().configure(|cfg| storefront_backend::configure(cfg, &ctx.services)),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["service"], json!("storefront-backend"));
}
