//! CI build webhooks: cancel aborted runs and report build verdicts.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{BuildStore, ReportStore};
use crate::error::{AppError, AppResult};
use crate::models::{Build, BuildEvent, CiEventType, EnrichedStep, SummaryResult, WebhookAck};

use super::analytics::{
    self, AnalyticsSink, REPORT_COUNT_EVENT, REPORT_RESULT_EVENT, SUMMARY_GENERATED_EVENT,
};
use super::dashboard::Dashboard;
use super::filler::ReportFiller;
use super::testing_service::TestingService;

/// Header carrying the CI event type.
pub const CI_EVENT_HEADER: &str = "Bitrise-Event-Type";

/// Worst outcome over device steps: a failure wins, then inconclusive, then skipped.
fn device_result(steps: &[EnrichedStep]) -> &'static str {
    let has = |outcome: &str| steps.iter().any(|s| s.outcome == outcome);
    if has("failure") {
        "failed"
    } else if has("inconclusive") {
        "inconclusive"
    } else if has("skipped") {
        "skipped"
    } else {
        "success"
    }
}

#[derive(Clone)]
pub struct WebhookService {
    testing: Arc<dyn TestingService>,
    builds: Arc<dyn BuildStore>,
    reports: Arc<dyn ReportStore>,
    analytics: Arc<dyn AnalyticsSink>,
    dashboard: Dashboard,
    filler: ReportFiller,
}

impl WebhookService {
    pub fn new(
        testing: Arc<dyn TestingService>,
        builds: Arc<dyn BuildStore>,
        reports: Arc<dyn ReportStore>,
        analytics: Arc<dyn AnalyticsSink>,
        dashboard: Dashboard,
        filler: ReportFiller,
    ) -> Self {
        Self {
            testing,
            builds,
            reports,
            analytics,
            dashboard,
            filler,
        }
    }

    /// Handle one CI notification.
    ///
    /// Triggered builds are acknowledged as-is. A finished build that was
    /// aborted has its matrix cancelled, then its totals are summarized.
    pub async fn handle(&self, event_type: &str, event: &BuildEvent) -> AppResult<WebhookAck> {
        let event_type = CiEventType::parse(event_type).ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid CI event type: '{}'", event_type))
        })?;

        if self.builds.find_app(&event.app_slug).await?.is_none() {
            return Err(AppError::NotFound("App".to_string()));
        }

        let summary = match event_type {
            CiEventType::BuildTriggered => None,
            CiEventType::BuildFinished => self.build_finished(event).await?,
        };

        Ok(WebhookAck {
            app_slug: event.app_slug.clone(),
            build_slug: event.build_slug.clone(),
            summary,
        })
    }

    async fn build_finished(&self, event: &BuildEvent) -> AppResult<Option<SummaryResult>> {
        let app_slug = event.app_slug.as_str();
        let build_slug = event.build_slug.as_str();
        let build = self.builds.find_build(app_slug, build_slug).await?;

        if event.is_aborted() {
            let build = build
                .as_ref()
                .ok_or_else(|| AppError::NotFound("Build".to_string()))?;
            self.cancel_running(build).await?;
        }

        let totals = match self.dashboard.summary(app_slug, build_slug).await {
            Ok(summary) => summary.totals,
            Err(e) => {
                warn!(
                    app_slug = %app_slug,
                    build_slug = %build_slug,
                    error = %e,
                    "Failed to get build totals"
                );
                return Ok(None);
            }
        };

        let result = SummaryResult::from_totals(&totals);
        analytics::send_build_event(
            self.analytics.as_ref(),
            SUMMARY_GENERATED_EVENT,
            app_slug,
            build_slug,
            vec![
                ("result", json!(result.as_str())),
                ("number_of_tests", json!(totals.tests)),
            ],
        );
        info!(
            app_slug = %app_slug,
            build_slug = %build_slug,
            result = result.as_str(),
            "Build summarized"
        );

        self.send_report_results(app_slug, build_slug).await;
        if let Some(build) = build.filter(|b| !b.needs_result_ids()) {
            self.send_device_result(&build).await;
        }

        Ok(Some(result))
    }

    async fn cancel_running(&self, build: &Build) -> AppResult<()> {
        if build.test_matrix_id.is_empty() {
            return Ok(());
        }
        self.testing.cancel_matrix(&build.test_matrix_id).await?;
        info!(
            app_slug = %build.app_slug,
            build_slug = %build.build_slug,
            matrix_id = %build.test_matrix_id,
            "Test matrix of aborted build cancelled"
        );
        Ok(())
    }

    /// One result event per uploaded report. Failures are logged and skipped.
    async fn send_report_results(&self, app_slug: &str, build_slug: &str) {
        let reports = match self.reports.list_uploaded_reports(app_slug, build_slug).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(
                    app_slug = %app_slug,
                    build_slug = %build_slug,
                    error = %e,
                    "Failed to list test reports"
                );
                return;
            }
        };

        analytics::send_build_event(
            self.analytics.as_ref(),
            REPORT_COUNT_EVENT,
            app_slug,
            build_slug,
            vec![("count", json!(reports.len()))],
        );

        let filled = match self.filler.fill_many(&reports, None).await {
            Ok(filled) => filled,
            Err(e) => {
                warn!(
                    app_slug = %app_slug,
                    build_slug = %build_slug,
                    error = %e,
                    "Failed to fill test reports"
                );
                return;
            }
        };

        for report in &filled {
            let failed = report
                .test_suites
                .iter()
                .any(|suite| suite.totals.failed > 0 || suite.totals.error > 0);
            analytics::send_build_event(
                self.analytics.as_ref(),
                REPORT_RESULT_EVENT,
                app_slug,
                build_slug,
                vec![
                    ("result", json!(if failed { "fail" } else { "success" })),
                    ("test_type", json!("unit")),
                    ("test_report_id", json!(report.id.to_string())),
                ],
            );
        }
    }

    async fn send_device_result(&self, build: &Build) {
        let steps = match self
            .dashboard
            .steps(&build.app_slug, &build.build_slug, None)
            .await
        {
            Ok(steps) => steps,
            Err(e) => {
                warn!(
                    app_slug = %build.app_slug,
                    build_slug = %build.build_slug,
                    error = %e,
                    "Failed to get device steps"
                );
                return;
            }
        };

        analytics::send_build_event(
            self.analytics.as_ref(),
            REPORT_RESULT_EVENT,
            &build.app_slug,
            &build.build_slug,
            vec![
                ("result", json!(device_result(&steps))),
                ("test_type", json!("ui")),
                ("test_report_id", json!(Uuid::nil().to_string())),
            ],
        );
    }
}
