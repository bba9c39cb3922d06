//! Domain models for the device test results service.

pub mod annotation;
pub mod build;
pub mod enriched_step;
pub mod junit;
pub mod matrix;
pub mod step;
pub mod step_result;
pub mod summary;
pub mod test_assets;
pub mod test_report;
pub mod webhook;

// Re-export commonly used types
pub use annotation::{Annotation, AnnotationLevel};
pub use build::{App, Build};
pub use enriched_step::{EnrichedStep, OutputUrls, TestResults, TestType};
pub use junit::{Suite, Test, TestStatus};
pub use matrix::{MatrixState, StartedMatrix, TestMatrixRequest, TestMatrixStatus};
pub use step::{ExecutionStep, ListStepsResponse, StepState};
pub use step_result::{LintStepResult, StepResultStatus, TestStepResult};
pub use summary::TestSummary;
pub use test_assets::{TestAssetUploadUrls, TestAssetsRequest};
pub use test_report::{
    NewTestReport, StepInfo, TestReport, TestReportAsset, TestReportPatch, TestReportUpload,
    TestReportWithTestSuites,
};
pub use webhook::{BuildEvent, CiEventType, SummaryResult, WebhookAck};

/// Optional status filter on list endpoints.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    /// The filter value, treating an empty string as no filter.
    pub fn filter(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }
}
