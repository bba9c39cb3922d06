//! Register, upload and read back JUnit reports.

use actix_web::test;
use serde_json::{Value, json};
use uuid::Uuid;

use super::test_helpers::{Harness, start_file_server};

const REPORTS: &str = "/api/v1/apps/app1/builds/b1/test_reports";

pub const MIXED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="suite">
    <testcase name="successful test"></testcase>
    <testcase name="failing test"><failure message="expected 1"/></testcase>
    <testcase name="skipped test"><skipped /></testcase>
    <testcase name="erroneous test"><error /></testcase>
  </testsuite>
</testsuites>"#;

pub fn new_report(step_id: &str) -> Value {
    json!({
        "name": "debug",
        "filename": "junit.xml",
        "filesize": 512,
        "step": {"id": step_id, "version": "1.0.0", "title": "Android Unit Test", "number": 3},
        "assets": [{"filename": "log.txt", "filesize": 20}]
    })
}

#[actix_rt::test]
async fn test_register_returns_upload_urls() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(REPORTS)
        .set_json(new_report("android-unit-test"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    let id = body["id"].as_str().unwrap();
    assert_eq!(body["uploaded"], false);
    assert_eq!(body["step"]["title"], "Android Unit Test");
    assert_eq!(
        body["upload_url"],
        format!("http://files.test/builds/b1/test_reports/{}/junit.xml?upload", id)
    );
    assert_eq!(body["assets"][0]["filename"], "log.txt");
    assert_eq!(
        body["assets"][0]["upload_url"],
        format!("http://files.test/builds/b1/test_reports/{}/assets/log.txt?upload", id)
    );
}

#[actix_rt::test]
async fn test_register_rejects_bad_input() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(REPORTS)
        .insert_header(("content-type", "application/json"))
        .set_payload("[1, 2")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let mut report = new_report("android-unit-test");
    report["filesize"] = json!(0);
    let req = test::TestRequest::post().uri(REPORTS).set_json(report).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_uploaded_report_is_listed_and_filled() {
    let files = start_file_server().await;
    let harness = Harness::new(&files.base);
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(REPORTS)
        .set_json(new_report("android-unit-test"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
    files.put(&format!("builds/b1/test_reports/{}/junit.xml", id), MIXED_XML);

    // Not listed until the upload is confirmed.
    let req = test::TestRequest::get().uri(REPORTS).to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed, json!([]));

    let req = test::TestRequest::patch()
        .uri(&format!("{}/{}", REPORTS, id))
        .set_json(json!({"uploaded": true}))
        .to_request();
    let patched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(patched["uploaded"], true);
    assert_eq!(harness.jobs.jobs_for(id).len(), 1);

    let req = test::TestRequest::get().uri(REPORTS).to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["step_info"]["id"], "android-unit-test");
    assert_eq!(listed[0]["test_suites"][0]["tests"].as_array().unwrap().len(), 4);

    let req = test::TestRequest::get()
        .uri(&format!("{}/{}?status=failed", REPORTS, id))
        .to_request();
    let filled: Value = test::call_and_read_body_json(&app, req).await;
    let names: Vec<_> = filled["test_suites"][0]["tests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["failing test", "erroneous test"]);
    assert_eq!(
        filled["test_assets"][0]["download_url"],
        format!("{}/builds/b1/test_reports/{}/assets/log.txt", files.base, id)
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/apps/app1/builds/b1/summary")
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        summary["totals"],
        json!({"tests": 4, "passed": 1, "skipped": 1, "failed": 2, "inconclusive": 0})
    );
}

#[actix_rt::test]
async fn test_report_scoped_to_build() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(REPORTS)
        .set_json(new_report("android-unit-test"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/apps/app1/builds/other/test_reports/{}", id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/apps/app2/builds/b1/test_reports/{}", id))
        .set_json(json!({"uploaded": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_rt::test]
async fn test_summary_of_unknown_build_is_zero() {
    let harness = Harness::new("http://files.test");
    let app = harness.app().await;

    let req = test::TestRequest::get()
        .uri("/api/v1/apps/app1/builds/nothing/summary")
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary["totals"]["tests"], 0);
}
