//! Builds and posts the CI step result of an uploaded test report.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::QueueSettings;
use crate::db::{BuildStore, ReportStore};
use crate::error::{AppError, AppResult};
use crate::models::annotation::Annotation;
use crate::models::junit::{Suite, Test};
use crate::models::step_result::{LintStepResult, StepResultStatus, TestStepResult};
use crate::models::{StepInfo, TestReport, TestReportWithTestSuites};

use super::ci_client::CiClient;
use super::filler::ReportFiller;
use super::junit;

fn collect_tests(suites: &[Suite], tests: &mut Vec<Test>) {
    for suite in suites {
        tests.extend(suite.tests.iter().cloned());
        collect_tests(&suite.suites, tests);
    }
}

/// Step result from an unfiltered report.
///
/// `total` counts every test case; the failed list keeps failures and errors.
pub fn test_step_result(
    report: &TestReport,
    step: &StepInfo,
    filled: &TestReportWithTestSuites,
) -> TestStepResult {
    let total = filled.test_suites.iter().map(|s| s.totals.tests).sum();
    let failed_suites = junit::filter_by_status(filled.test_suites.clone(), "failed");
    let mut failed_tests = Vec::new();
    collect_tests(&failed_suites, &mut failed_tests);

    let status = if total == 0 {
        StepResultStatus::Empty
    } else if failed_tests.is_empty() {
        StepResultStatus::Success
    } else {
        StepResultStatus::Failed
    };

    TestStepResult {
        name: report.result_name(step),
        status,
        total,
        failed_tests,
    }
}

pub fn lint_step_result(
    report: &TestReport,
    step: &StepInfo,
    annotations: Vec<Annotation>,
) -> LintStepResult {
    LintStepResult {
        name: report.result_name(step),
        status: if annotations.is_empty() {
            StepResultStatus::Success
        } else {
            StepResultStatus::Failed
        },
        annotations,
    }
}

/// Publishes step results for reports by id.
#[derive(Clone)]
pub struct StepResultPublisher {
    reports: Arc<dyn ReportStore>,
    builds: Arc<dyn BuildStore>,
    filler: ReportFiller,
    ci: Arc<dyn CiClient>,
    settings: QueueSettings,
}

impl StepResultPublisher {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        builds: Arc<dyn BuildStore>,
        filler: ReportFiller,
        ci: Arc<dyn CiClient>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            reports,
            builds,
            filler,
            ci,
            settings,
        }
    }

    /// Fill the report and post its result with the owning app's token.
    pub async fn publish(&self, report_id: Uuid) -> AppResult<()> {
        let report = self
            .reports
            .get_report(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test report {}", report_id)))?;

        let step = report.step_info().map_err(|e| {
            AppError::ParseFailed(format!("Failed to get step info for test report: {}", e))
        })?;

        let app = self
            .builds
            .find_app(&report.app_slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("App {}", report.app_slug)))?;

        if self.settings.is_lint_step(&step.id) {
            let annotations = self.filler.annotate(&report).await?;
            let result = lint_step_result(&report, &step, annotations);
            self.ci
                .create_lint_step_result(&app.ci_api_token, &report.app_slug, &report.build_slug, &result)
                .await?;
            info!(
                report_id = %report.id,
                status = ?result.status,
                annotations = result.annotations.len(),
                "Published lint step result"
            );
        } else {
            let filled = self.filler.fill_one(&report, None).await?;
            let result = test_step_result(&report, &step, &filled);
            self.ci
                .create_test_step_result(&app.ci_api_token, &report.app_slug, &report.build_slug, &result)
                .await?;
            info!(
                report_id = %report.id,
                status = ?result.status,
                total = result.total,
                failed = result.failed_tests.len(),
                "Published test step result"
            );
        }

        Ok(())
    }
}
