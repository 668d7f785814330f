mod support;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::Value;
use support::app::{create_test_app, TestBridgeBuilder};

#[actix_web::test]
async fn health_needs_no_credential() {
    bridge_test_support::logging::init();
    let bridge = TestBridgeBuilder::new().build().await;
    let app = create_test_app(bridge.state).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store");
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "ok": true }));
    assert_eq!(bridge.keys.fetches(), 0);
}
