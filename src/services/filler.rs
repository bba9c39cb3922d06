//! Merges stored test reports with their downloaded JUnit content.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::annotation::{Annotation, CheckstyleReport};
use crate::models::test_report::{TestReport, TestReportAssetInfo, TestReportWithTestSuites};

use super::junit;
use super::storage::ArtifactResolver;

/// Fills reports with parsed suites and signed asset URLs.
#[derive(Clone)]
pub struct ReportFiller {
    resolver: Arc<dyn ArtifactResolver>,
    http: reqwest::Client,
}

impl ReportFiller {
    pub fn new(resolver: Arc<dyn ArtifactResolver>, http: reqwest::Client) -> Self {
        Self { resolver, http }
    }

    /// Download the report file through a signed URL.
    async fn download(&self, report: &TestReport) -> AppResult<String> {
        let path = report.path_in_bucket();
        let url = self.resolver.resolve(&path).await?;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::DownloadFailed(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(report_id = %report.id, status = %status, "Report download returned non-200");
            return Err(AppError::DownloadFailed(format!(
                "GET {} returned status {}",
                path, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::DownloadFailed(format!("Reading {} failed: {}", path, e)))
    }

    /// Fill one report, optionally keeping only tests of `status`.
    pub async fn fill_one(
        &self,
        report: &TestReport,
        status: Option<&str>,
    ) -> AppResult<TestReportWithTestSuites> {
        let xml = self.download(report).await?;

        let mut test_suites = junit::parse(&xml)?;
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            test_suites = junit::filter_by_status(test_suites, status);
        }

        let step_info = report.step_info().map_err(|e| {
            AppError::ParseFailed(format!("Failed to get step info for test report: {}", e))
        })?;

        let mut test_assets = Vec::with_capacity(report.assets.len());
        for asset in &report.assets {
            let download_url = self
                .resolver
                .resolve(&report.asset_path_in_bucket(asset))
                .await?;
            test_assets.push(TestReportAssetInfo {
                filename: asset.filename.clone(),
                filesize: asset.filesize,
                uploaded: asset.uploaded,
                download_url,
                created_at: asset.created_at,
            });
        }

        debug!(
            report_id = %report.id,
            suites = test_suites.len(),
            assets = test_assets.len(),
            "Filled test report"
        );

        Ok(TestReportWithTestSuites {
            id: report.id,
            test_suites,
            step_info,
            test_assets,
        })
    }

    /// Fill reports one after another. The first failure aborts the batch.
    pub async fn fill_many(
        &self,
        reports: &[TestReport],
        status: Option<&str>,
    ) -> AppResult<Vec<TestReportWithTestSuites>> {
        let mut filled = Vec::with_capacity(reports.len());
        for report in reports {
            filled.push(self.fill_one(report, status).await?);
        }
        Ok(filled)
    }

    /// Parse a checkstyle lint report into source annotations.
    pub async fn annotate(&self, report: &TestReport) -> AppResult<Vec<Annotation>> {
        let xml = self.download(report).await?;
        let checkstyle: CheckstyleReport = quick_xml::de::from_str(&xml)?;
        Ok(checkstyle.into_annotations())
    }
}
