//! Persistence seams used by the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{App, Build, NewTestReport, TestReport, TestReportPatch};

/// Apps and the test-matrix bookkeeping of their builds.
#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn find_app(&self, app_slug: &str) -> AppResult<Option<App>>;

    async fn find_build(&self, app_slug: &str, build_slug: &str) -> AppResult<Option<Build>>;

    /// Insert or update a build keyed by app and build slug.
    async fn save_build(&self, build: &Build) -> AppResult<Build>;

    /// Builds with an open session whose last request is at or before `before`.
    async fn list_expired_open_builds(&self, before: DateTime<Utc>) -> AppResult<Vec<Build>>;
}

/// Test report records and their assets.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create_report(
        &self,
        app_slug: &str,
        build_slug: &str,
        report: &NewTestReport,
    ) -> AppResult<TestReport>;

    async fn get_report(&self, id: Uuid) -> AppResult<Option<TestReport>>;

    /// Uploaded reports of one build, oldest first.
    async fn list_uploaded_reports(
        &self,
        app_slug: &str,
        build_slug: &str,
    ) -> AppResult<Vec<TestReport>>;

    async fn update_report(&self, id: Uuid, patch: &TestReportPatch) -> AppResult<TestReport>;
}
