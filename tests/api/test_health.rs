//! Health and readiness checks.

use actix_web::test;
use serde_json::Value;

use super::test_helpers::Harness;

#[actix_rt::test]
async fn test_health() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_rt::test]
async fn test_ready_without_database() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::get().uri("/api/v1/ready").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "in-memory");
    assert_eq!(body["device_catalog"], "empty");
}
