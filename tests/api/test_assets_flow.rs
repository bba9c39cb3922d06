//! Upload URLs for test binaries and download URLs for device results.

use actix_web::test;
use device_test_results::db::BuildStore;
use serde_json::{Value, json};

use super::test_helpers::Harness;

const BASE: &str = "/api/v1/apps/app1/builds/build1";

#[actix_rt::test]
async fn test_upload_urls_open_build_session() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test/assets", BASE))
        .set_json(json!({"obb_files": ["main.1.com.example.obb"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["app_url"], "http://files.test/android-tests/build1/app.apk?upload");
    assert_eq!(
        body["test_app_url"],
        "http://files.test/android-tests/build1/app-test.apk?upload"
    );
    assert_eq!(
        body["obb_urls"]["main.1.com.example.obb"],
        "http://files.test/android-tests/build1/main.1.com.example.obb?upload"
    );
    assert_eq!(
        harness.analytics.names(),
        vec!["vdt_android_addon_file_upload_requested".to_string()]
    );

    // A second request for the same build is refused.
    let req = test::TestRequest::post()
        .uri(&format!("{}/test/assets", BASE))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    // The session opened by the upload lets the matrix start.
    let req = test::TestRequest::post()
        .uri(&format!("{}/test", BASE))
        .set_json(json!({
            "testSpecification": {"androidRoboTest": {}},
            "environmentMatrix": {"androidDeviceList": {"androidDevices": [
                {"androidModelId": "NexusLowRes", "androidVersionId": "24", "locale": "en", "orientation": "portrait"}
            ]}}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let build: Value = test::read_body_json(resp).await;
    assert_eq!(build["build_session_enabled"], true);
}

#[actix_rt::test]
async fn test_upload_urls_without_body() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/test/assets", BASE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.get("obb_urls").is_none());
    assert!(body["app_url"].as_str().unwrap().ends_with("app.apk?upload"));
}

#[actix_rt::test]
async fn test_upload_urls_reject_bad_requests() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let obb_files: Vec<String> = (0..11).map(|i| format!("patch.{}.obb", i)).collect();
    let req = test::TestRequest::post()
        .uri(&format!("{}/test/assets", BASE))
        .set_json(json!({ "obb_files": obb_files }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");

    let req = test::TestRequest::post()
        .uri(&format!("{}/test/assets", BASE))
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"obb_files\": ")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // Rejected requests leave no build behind.
    assert!(harness.store.find_build("app1", "build1").await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_download_urls_of_results() {
    let harness = Harness::new("http://files.test");
    harness.resolver.objects.lock().unwrap().extend([
        "android-tests/build1/results/NexusLowRes-24-en-portrait/logcat".to_string(),
        "android-tests/build1/results/NexusLowRes-24-en-portrait/test_result_1.xml".to_string(),
        "android-tests/build1/app.apk".to_string(),
    ]);
    let app = harness.app().await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/test/assets", BASE))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let files = body.as_object().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(
        files["NexusLowRes-24-en-portrait_logcat"],
        "http://files.test/android-tests/build1/results/NexusLowRes-24-en-portrait/logcat"
    );
    assert!(files.contains_key("NexusLowRes-24-en-portrait_test_result_1.xml"));
}
