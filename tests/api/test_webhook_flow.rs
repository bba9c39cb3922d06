//! CI build webhooks over HTTP.

use actix_web::test;
use device_test_results::models::App;
use secrecy::SecretString;
use serde_json::{Value, json};

use super::test_helpers::{Harness, start_file_server};
use super::test_reports_flow::{MIXED_XML, new_report};

const EVENT_HEADER: &str = "Bitrise-Event-Type";

fn build_event(status: i64) -> Value {
    json!({
        "app_slug": "app1",
        "build_slug": "b1",
        "build_number": 12,
        "build_status": status,
        "build_triggered_workflow": "primary",
        "git": {"provider": "github", "src_branch": "feature", "dst_branch": "main", "pull_request_id": 7}
    })
}

fn with_app(harness: &Harness) {
    harness
        .store
        .insert_app(App {
            app_slug: "app1".to_string(),
            ci_api_token: SecretString::from("ci-token"),
        })
        .unwrap();
}

fn summary_results(harness: &Harness) -> Vec<Value> {
    harness
        .analytics
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.name == "Test report summary generated")
        .map(|e| e.properties["result"].clone())
        .collect()
}

#[actix_rt::test]
async fn test_finished_build_with_failures() {
    let files = start_file_server().await;
    let harness = Harness::new(&files.base);
    with_app(&harness);
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri("/api/v1/apps/app1/builds/b1/test_reports")
        .set_json(new_report("android-unit-test"))
        .to_request();
    let registered: Value = test::call_and_read_body_json(&app, req).await;
    let id = registered["id"].as_str().unwrap().to_string();
    files.put(&format!("builds/b1/test_reports/{}/junit.xml", id), MIXED_XML);
    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/apps/app1/builds/b1/test_reports/{}", id))
        .set_json(json!({"uploaded": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/api/v1/webhook")
        .insert_header((EVENT_HEADER, "build/finished"))
        .set_json(build_event(1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["app_slug"], "app1");
    assert_eq!(body["summary"], "fail");

    assert_eq!(summary_results(&harness), vec![json!("fail")]);
    let events = harness.analytics.events.lock().unwrap();
    let result = events
        .iter()
        .find(|e| e.name == "Test report result")
        .unwrap();
    assert_eq!(result.properties["test_report_id"], json!(id));
    assert_eq!(result.properties["test_type"], "unit");
}

#[actix_rt::test]
async fn test_aborted_build_cancels_running_matrix() {
    let harness = Harness::new("http://127.0.0.1:9");
    with_app(&harness);
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri("/api/v1/apps/app1/builds/b1/test")
        .set_json(json!({
            "testSpecification": {"androidRoboTest": {}},
            "environmentMatrix": {"androidDeviceList": {"androidDevices": [
                {"androidModelId": "NexusLowRes", "androidVersionId": "24", "locale": "en", "orientation": "portrait"}
            ]}}
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/v1/webhook")
        .insert_header((EVENT_HEADER, "build/finished"))
        .set_json(build_event(3))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["summary"], "empty");
    assert_eq!(*harness.testing.cancelled.lock().unwrap(), vec!["matrix-42".to_string()]);
    assert_eq!(summary_results(&harness), vec![json!("empty")]);
}

#[actix_rt::test]
async fn test_webhook_rejects_unknown_events() {
    let harness = Harness::new("http://127.0.0.1:9");
    with_app(&harness);
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri("/api/v1/webhook")
        .set_json(build_event(1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/webhook")
        .insert_header((EVENT_HEADER, "build/triggered"))
        .set_json(build_event(0))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.get("summary").is_none());

    let req = test::TestRequest::post()
        .uri("/api/v1/webhook")
        .insert_header((EVENT_HEADER, "build/finished"))
        .set_json(build_event(3))
        .to_request();
    // Aborted build that never started anything.
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}
