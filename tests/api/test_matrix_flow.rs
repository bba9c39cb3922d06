//! Start, poll, inspect and cancel a test matrix over HTTP.

use actix_web::test;
use serde_json::{Value, json};

use super::test_helpers::{BUCKET, Harness};

const BASE: &str = "/api/v1/apps/app1/builds/build1";

fn robo_request() -> Value {
    json!({
        "testSpecification": {"testTimeout": "7200s", "androidRoboTest": {}},
        "environmentMatrix": {"androidDeviceList": {"androidDevices": [
            {"androidModelId": "NexusLowRes", "androidVersionId": "24", "locale": "en", "orientation": "portrait"}
        ]}}
    })
}

fn step(id: &str, state: &str, outcome: &str) -> Value {
    json!({
        "stepId": id,
        "name": "Robo test",
        "state": state,
        "outcome": {"summary": outcome},
        "dimensionValue": [{"key": "Model", "value": "NexusLowRes"}, {"key": "Version", "value": "24"}]
    })
}

#[actix_rt::test]
async fn test_start_matrix_twice_is_refused() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(robo_request())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let build: Value = test::read_body_json(resp).await;
    assert_eq!(build["test_matrix_id"], "matrix-42");
    assert_eq!(build["build_session_enabled"], true);

    let created = harness.testing.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].test_specification.test_timeout.as_deref(), Some("3600s"));
    let storage = created[0].result_storage.clone().unwrap();
    assert_eq!(
        storage["googleCloudStorage"]["gcsPath"],
        format!("gs://{}/android-tests/build1/results/", BUCKET)
    );
    assert!(harness
        .analytics
        .names()
        .contains(&"vdt_android_addon_test_started".to_string()));

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(robo_request())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "CONFLICT");
}

#[actix_rt::test]
async fn test_poll_until_complete() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(robo_request())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    harness.testing.push_matrix(json!({"testMatrixId": "matrix-42", "state": "PENDING"}));
    let req = test::TestRequest::get().uri(&format!("{}/test", BASE)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"state": "PENDING"}));

    harness.testing.push_matrix(json!({
        "testMatrixId": "matrix-42",
        "state": "RUNNING",
        "testExecutions": [{"toolResultsStep": {"historyId": "h1", "executionId": "e1"}}]
    }));
    harness
        .testing
        .push_steps(json!([step("s1", "inProgress", "")]));
    let req = test::TestRequest::get().uri(&format!("{}/test", BASE)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["steps"][0]["stepId"], "s1");

    harness.testing.push_steps(json!([
        step("s1", "complete", "success"),
        step("s2", "complete", "failure")
    ]));
    let req = test::TestRequest::get().uri(&format!("{}/test", BASE)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);

    let names = harness.analytics.names();
    assert_eq!(
        names
            .iter()
            .filter(|n| *n == "vdt_android_addon_test_finished_on_device")
            .count(),
        2
    );
    let finished = harness
        .analytics
        .events
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.name == "vdt_android_addon_test_finished")
        .cloned()
        .unwrap();
    assert_eq!(finished.properties["test_result"], "failed");

    harness
        .testing
        .push_steps(json!([step("s1", "complete", "success"), step("s2", "complete", "failure")]));
    let req = test::TestRequest::get()
        .uri(&format!("{}/steps?status=failed", BASE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let steps = body.as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["step_id"], "s2");
    assert_eq!(steps[0]["device_name"], "NexusLowRes");
}

#[actix_rt::test]
async fn test_poll_error_state() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(robo_request())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    harness.testing.push_matrix(json!({
        "testMatrixId": "matrix-42",
        "state": "INVALID",
        "invalidMatrixDetails": "NO_SIGNATURE"
    }));
    let req = test::TestRequest::get().uri(&format!("{}/test", BASE)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "TEST_MATRIX_FAILED");
}

#[actix_rt::test]
async fn test_poll_unknown_build() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::get()
        .uri("/api/v1/apps/app1/builds/missing/test")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_rt::test]
async fn test_cancel_matrix() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::delete().uri(&format!("{}/test", BASE)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(robo_request())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::delete().uri(&format!("{}/test", BASE)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    assert_eq!(*harness.testing.cancelled.lock().unwrap(), vec!["matrix-42".to_string()]);
}

#[actix_rt::test]
async fn test_malformed_body_is_bad_request() {
    let harness = Harness::new("http://127.0.0.1:9");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");
}
