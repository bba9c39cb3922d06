//! Uploaded reports are published to CI by the background worker.

use std::sync::{Arc, Mutex};

use actix_web::test;
use async_trait::async_trait;
use device_test_results::config::QueueSettings;
use device_test_results::error::{AppError, AppResult};
use device_test_results::models::{App, LintStepResult, StepResultStatus, TestStepResult};
use device_test_results::services::publish_queue::JobStatus;
use device_test_results::services::{CiClient, PublishWorker, ReportFiller, StepResultPublisher};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use uuid::Uuid;

use super::test_helpers::{FileServer, Harness, start_file_server};
use super::test_reports_flow::{MIXED_XML, new_report};

const REPORTS: &str = "/api/v1/apps/app1/builds/b1/test_reports";

#[derive(Default)]
struct RecordingCi {
    tests: Mutex<Vec<(String, String, TestStepResult)>>,
    lints: Mutex<Vec<LintStepResult>>,
    fail: bool,
}

#[async_trait]
impl CiClient for RecordingCi {
    async fn create_test_step_result(
        &self,
        token: &SecretString,
        _app_slug: &str,
        build_slug: &str,
        result: &TestStepResult,
    ) -> AppResult<()> {
        if self.fail {
            return Err(AppError::QueuePublishFailed("ci unavailable".to_string()));
        }
        self.tests.lock().unwrap().push((
            token.expose_secret().to_string(),
            build_slug.to_string(),
            result.clone(),
        ));
        Ok(())
    }

    async fn create_lint_step_result(
        &self,
        _token: &SecretString,
        _app_slug: &str,
        _build_slug: &str,
        result: &LintStepResult,
    ) -> AppResult<()> {
        self.lints.lock().unwrap().push(result.clone());
        Ok(())
    }
}

fn queue_settings() -> QueueSettings {
    QueueSettings {
        poll_interval_secs: 1,
        concurrency: 2,
        max_attempts: 3,
        lease_secs: 60,
        publish_delay_secs: 0,
        lint_step_ids: vec!["android-lint".to_string()],
    }
}

fn worker(harness: &Harness, ci: Arc<RecordingCi>) -> PublishWorker {
    let filler = ReportFiller::new(harness.resolver.clone(), reqwest::Client::new());
    let publisher = StepResultPublisher::new(
        harness.store.clone(),
        harness.store.clone(),
        filler,
        ci,
        queue_settings(),
    );
    PublishWorker::new(harness.jobs.clone(), Arc::new(publisher), queue_settings())
}

async fn upload_report(harness: &Harness, files: &FileServer, step_id: &str, body: &str) -> Uuid {
    harness
        .store
        .insert_app(App {
            app_slug: "app1".to_string(),
            ci_api_token: SecretString::from("ci-token"),
        })
        .unwrap();
    let app = harness.app().await;

    let req = test::TestRequest::post()
        .uri(REPORTS)
        .set_json(new_report(step_id))
        .to_request();
    let registered: Value = test::call_and_read_body_json(&app, req).await;
    let id: Uuid = registered["id"].as_str().unwrap().parse().unwrap();
    files.put(&format!("builds/b1/test_reports/{}/junit.xml", id), body);

    let req = test::TestRequest::patch()
        .uri(&format!("{}/{}", REPORTS, id))
        .set_json(json!({"uploaded": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    id
}

#[actix_rt::test]
async fn test_uploaded_report_posts_step_result() {
    let files = start_file_server().await;
    let harness = Harness::new(&files.base);
    let id = upload_report(&harness, &files, "android-unit-test", MIXED_XML).await;

    let ci = Arc::new(RecordingCi::default());
    let handles = worker(&harness, ci.clone()).dispatch_due().await.unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }

    let posted = ci.tests.lock().unwrap();
    assert_eq!(posted.len(), 1);
    let (token, build_slug, result) = &posted[0];
    assert_eq!(token, "ci-token");
    assert_eq!(build_slug, "b1");
    assert_eq!(result.name, "Android Unit Test (debug)");
    assert_eq!(result.status, StepResultStatus::Failed);
    assert_eq!(result.total, 4);
    assert_eq!(result.failed_tests.len(), 2);

    assert_eq!(harness.jobs.jobs_for(id), vec![(JobStatus::Done, 1, None)]);
}

#[actix_rt::test]
async fn test_failed_publish_is_retried_later() {
    let files = start_file_server().await;
    let harness = Harness::new(&files.base);
    let id = upload_report(&harness, &files, "android-unit-test", MIXED_XML).await;

    let ci = Arc::new(RecordingCi {
        fail: true,
        ..Default::default()
    });
    let worker = worker(&harness, ci);
    for handle in worker.dispatch_due().await.unwrap() {
        handle.await.unwrap();
    }

    let jobs = harness.jobs.jobs_for(id);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].0, JobStatus::Pending);
    assert_eq!(jobs[0].1, 1);
    assert!(jobs[0].2.as_deref().unwrap().contains("ci unavailable"));

    // Backoff keeps the job out of the next dispatch.
    assert!(worker.dispatch_due().await.unwrap().is_empty());
}

#[actix_rt::test]
async fn test_lint_report_posts_annotations() {
    let files = start_file_server().await;
    let harness = Harness::new(&files.base);
    let checkstyle = r#"<?xml version="1.0"?>
<checkstyle version="8.0">
  <file name="app/src/Main.kt">
    <error line="12" column="4" severity="error" message="Unused import" source="lint.UnusedImport"/>
  </file>
</checkstyle>"#;
    upload_report(&harness, &files, "android-lint", checkstyle).await;

    let ci = Arc::new(RecordingCi::default());
    for handle in worker(&harness, ci.clone()).dispatch_due().await.unwrap() {
        handle.await.unwrap();
    }

    assert!(ci.tests.lock().unwrap().is_empty());
    let lints = ci.lints.lock().unwrap();
    assert_eq!(lints.len(), 1);
    assert_eq!(lints[0].status, StepResultStatus::Failed);
    assert_eq!(lints[0].annotations.len(), 1);
}
