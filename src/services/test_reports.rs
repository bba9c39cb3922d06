//! Test report registration and upload completion.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::db::ReportStore;
use crate::error::{AppError, AppResult};
use crate::models::test_report::TestReportAssetUpload;
use crate::models::{NewTestReport, TestReport, TestReportPatch, TestReportUpload};

use super::publish_queue::PublishQueue;
use super::storage::ArtifactResolver;

#[derive(Clone)]
pub struct TestReportService {
    reports: Arc<dyn ReportStore>,
    resolver: Arc<dyn ArtifactResolver>,
    queue: PublishQueue,
    publish_delay_secs: u64,
}

impl TestReportService {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        resolver: Arc<dyn ArtifactResolver>,
        queue: PublishQueue,
        publish_delay_secs: u64,
    ) -> Self {
        Self {
            reports,
            resolver,
            queue,
            publish_delay_secs,
        }
    }

    /// Load a report owned by the given build.
    pub async fn find(&self, app_slug: &str, build_slug: &str, id: Uuid) -> AppResult<TestReport> {
        self.reports
            .get_report(id)
            .await?
            .filter(|r| r.app_slug == app_slug && r.build_slug == build_slug)
            .ok_or_else(|| AppError::NotFound(format!("Test report {}", id)))
    }

    pub async fn list_uploaded(&self, app_slug: &str, build_slug: &str) -> AppResult<Vec<TestReport>> {
        self.reports.list_uploaded_reports(app_slug, build_slug).await
    }

    /// Create a report record and sign upload URLs for it and its assets.
    pub async fn register(
        &self,
        app_slug: &str,
        build_slug: &str,
        new_report: &NewTestReport,
    ) -> AppResult<TestReportUpload> {
        new_report.validate().map_err(AppError::InvalidInput)?;

        let report = self
            .reports
            .create_report(app_slug, build_slug, new_report)
            .await?;

        let upload_url = self.resolver.upload_url(&report.path_in_bucket()).await?;
        let mut assets = Vec::with_capacity(report.assets.len());
        for asset in &report.assets {
            assets.push(TestReportAssetUpload {
                upload_url: self
                    .resolver
                    .upload_url(&report.asset_path_in_bucket(asset))
                    .await?,
                asset: asset.clone(),
            });
        }

        info!(
            report_id = %report.id,
            app_slug = %app_slug,
            build_slug = %build_slug,
            assets = assets.len(),
            "Test report registered"
        );

        Ok(TestReportUpload {
            id: report.id,
            name: report.name,
            filename: report.filename,
            filesize: report.filesize,
            step: report.step,
            uploaded: report.uploaded,
            app_slug: report.app_slug,
            build_slug: report.build_slug,
            created_at: report.created_at,
            upload_url,
            assets,
        })
    }

    /// Apply a patch; marking a report uploaded schedules its step result.
    pub async fn update(
        &self,
        app_slug: &str,
        build_slug: &str,
        id: Uuid,
        patch: &TestReportPatch,
    ) -> AppResult<TestReport> {
        let existing = self.find(app_slug, build_slug, id).await?;
        let report = self.reports.update_report(existing.id, patch).await?;

        if patch.uploaded == Some(true) {
            self.queue.enqueue(report.id, self.publish_delay_secs).await?;
        }

        Ok(report)
    }
}
