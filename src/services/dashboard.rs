//! Build dashboard: enriched device steps and build totals.

use std::sync::Arc;

use tracing::debug;

use crate::db::{BuildStore, ReportStore};
use crate::error::{AppError, AppResult};
use crate::models::summary::Totals;
use crate::models::{EnrichedStep, TestSummary};

use super::aggregator::aggregate_steps;
use super::catalog::DeviceCatalog;
use super::filler::ReportFiller;
use super::polling::retry_once;
use super::storage::ArtifactResolver;
use super::testing_service::TestingService;

#[derive(Clone)]
pub struct Dashboard {
    testing: Arc<dyn TestingService>,
    builds: Arc<dyn BuildStore>,
    reports: Arc<dyn ReportStore>,
    catalog: Arc<DeviceCatalog>,
    resolver: Arc<dyn ArtifactResolver>,
    filler: ReportFiller,
}

impl Dashboard {
    pub fn new(
        testing: Arc<dyn TestingService>,
        builds: Arc<dyn BuildStore>,
        reports: Arc<dyn ReportStore>,
        catalog: Arc<DeviceCatalog>,
        resolver: Arc<dyn ArtifactResolver>,
        filler: ReportFiller,
    ) -> Self {
        Self {
            testing,
            builds,
            reports,
            catalog,
            resolver,
            filler,
        }
    }

    async fn enriched_steps(&self, history_id: &str, execution_id: &str) -> AppResult<Vec<EnrichedStep>> {
        let steps = retry_once("list steps", || {
            self.testing.list_steps(history_id, execution_id)
        })
        .await?;

        aggregate_steps(steps, Arc::clone(&self.catalog), Arc::clone(&self.resolver)).await
    }

    /// Enriched steps of a build, optionally filtered by outcome.
    pub async fn steps(
        &self,
        app_slug: &str,
        build_slug: &str,
        status: Option<&str>,
    ) -> AppResult<Vec<EnrichedStep>> {
        let build = self
            .builds
            .find_build(app_slug, build_slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Build".to_string()))?;

        if build.needs_result_ids() {
            return Err(AppError::NotFound("Test execution".to_string()));
        }

        let mut steps = self
            .enriched_steps(&build.test_history_id, &build.test_execution_id)
            .await?;

        if let Some(status) = status.filter(|s| !s.is_empty()) {
            steps.retain(|step| step.matches_status(status));
        }

        Ok(steps)
    }

    /// Totals over the build's uploaded reports and, once known, its device steps.
    pub async fn summary(&self, app_slug: &str, build_slug: &str) -> AppResult<TestSummary> {
        let reports = self.reports.list_uploaded_reports(app_slug, build_slug).await?;
        let filled = self.filler.fill_many(&reports, None).await?;

        let mut totals = Totals::default();
        for report in &filled {
            totals.add_report(report);
        }

        let build = match self.builds.find_build(app_slug, build_slug).await? {
            Some(build) if !build.needs_result_ids() => build,
            _ => {
                debug!(app_slug = %app_slug, build_slug = %build_slug, "No device test run for build");
                return Ok(TestSummary { totals });
            }
        };

        let steps = self
            .enriched_steps(&build.test_history_id, &build.test_execution_id)
            .await?;
        for step in &steps {
            totals.add_step(step);
        }

        Ok(TestSummary { totals })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use uuid::Uuid;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Build;
    use crate::services::catalog::tests::sample_catalog;
    use crate::services::enrichment::tests::step_with_outputs;
    use crate::services::filler::tests::{LocalResolver, MIXED_XML, report, start_file_server};
    use crate::services::storage::fake::FakeResolver;
    use crate::services::testing_service::fake::FakeTestingService;

    fn step_json(id: &str, state: &str, outcome: &str) -> crate::models::ExecutionStep {
        serde_json::from_value(serde_json::json!({
            "stepId": id,
            "name": "Robo test",
            "state": state,
            "outcome": {"summary": outcome}
        }))
        .unwrap()
    }

    async fn store_with_build(history: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut build = Build::new("app1", "buildslug1");
        build.test_matrix_id = "matrix-1".to_string();
        build.test_history_id = history.to_string();
        build.test_execution_id = if history.is_empty() { String::new() } else { "e1".to_string() };
        store.save_build(&build).await.unwrap();
        store
    }

    fn dashboard(testing: FakeTestingService, store: Arc<MemoryStore>, files_base: &str) -> Dashboard {
        Dashboard::new(
            Arc::new(testing),
            store.clone(),
            store,
            Arc::new(sample_catalog()),
            Arc::new(FakeResolver::new("bucket")),
            ReportFiller::new(
                Arc::new(LocalResolver {
                    base: files_base.to_string(),
                }),
                reqwest::Client::new(),
            ),
        )
    }

    #[tokio::test]
    async fn test_steps_filtered_by_status() {
        let testing = FakeTestingService::default().with_steps(vec![Ok(vec![
            step_json("s1", "complete", "success"),
            step_json("s2", "complete", "failure"),
            step_json("s3", "inProgress", ""),
        ])]);
        let store = store_with_build("h1").await;
        let dashboard = dashboard(testing, store, "http://127.0.0.1:9");

        let steps = dashboard.steps("app1", "buildslug1", Some("failed")).await.unwrap();
        let ids: Vec<_> = steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }

    #[tokio::test]
    async fn test_steps_enriched_with_signed_urls() {
        let testing = FakeTestingService::default().with_steps(vec![Ok(vec![step_with_outputs(
            "s1",
            &["gs://bucket/android-tests/b1/results/device1/video.mp4"],
        )])]);
        let store = store_with_build("h1").await;
        let dashboard = dashboard(testing, store, "http://127.0.0.1:9");

        let steps = dashboard.steps("app1", "buildslug1", None).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].output_urls.video_url.as_deref(),
            Some("https://signed.test/android-tests/b1/results/device1/video.mp4?sig=get")
        );
    }

    #[tokio::test]
    async fn test_steps_without_execution_is_not_found() {
        let store = store_with_build("").await;
        let dashboard = dashboard(FakeTestingService::default(), store, "http://127.0.0.1:9");

        let result = dashboard.steps("app1", "buildslug1", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = dashboard.steps("app1", "other", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[actix_rt::test]
    async fn test_summary_counts_reports_and_steps() {
        let id = Uuid::new_v4();
        let r = report(id, serde_json::json!({"title": "Unit"}));
        let mut files = HashMap::new();
        files.insert(r.path_in_bucket(), MIXED_XML.to_string());
        let base = start_file_server(files).await;

        let store = store_with_build("h1").await;
        store.insert_report(r).unwrap();
        let testing = FakeTestingService::default().with_steps(vec![Ok(vec![
            step_json("s1", "complete", "success"),
            step_json("s2", "complete", "inconclusive"),
        ])]);

        let summary = dashboard(testing, store, &base)
            .summary("app1", "buildslug1")
            .await
            .unwrap();

        assert_eq!(summary.totals.tests, 4);
        assert_eq!(summary.totals.passed, 2);
        assert_eq!(summary.totals.failed, 2);
        assert_eq!(summary.totals.skipped, 1);
        assert_eq!(summary.totals.inconclusive, 1);
    }

    #[tokio::test]
    async fn test_summary_without_build_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let summary = dashboard(FakeTestingService::default(), store, "http://127.0.0.1:9")
            .summary("app1", "buildslug1")
            .await
            .unwrap();
        assert_eq!(summary, TestSummary::default());
    }
}
