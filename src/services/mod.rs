//! Business logic services.

pub mod aggregator;
pub mod analytics;
pub mod catalog;
pub mod ci_client;
pub mod cleanup;
pub mod dashboard;
pub mod enrichment;
pub mod filler;
pub mod junit;
pub mod matrix;
pub mod polling;
pub mod publish_queue;
pub mod step_result;
pub mod storage;
pub mod test_assets;
pub mod test_reports;
pub mod testing_service;
pub mod webhook;

pub use aggregator::aggregate_steps;
pub use analytics::{AnalyticsSink, TracingAnalytics};
pub use catalog::{DeviceCatalog, load_device_catalog};
pub use ci_client::{CiClient, RestCiClient};
pub use cleanup::start_build_cleanup;
pub use dashboard::Dashboard;
pub use filler::ReportFiller;
pub use matrix::{MatrixContext, cancel_test_matrix, start_test_matrix};
pub use polling::{PollResult, poll_test_execution};
pub use publish_queue::{JobStore, MemoryJobStore, PublishQueue, PublishWorker};
pub use step_result::StepResultPublisher;
pub use storage::{ArtifactResolver, S3ArtifactResolver};
pub use test_reports::TestReportService;
pub use testing_service::{RestTestingService, TestingService};
pub use webhook::WebhookService;
