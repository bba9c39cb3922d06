//! API endpoint modules.

pub mod dashboard;
pub mod health;
pub mod test_assets;
pub mod test_matrix;
pub mod test_reports;
pub mod webhook;

use std::sync::Arc;

use actix_web::{HttpRequest, error::JsonPayloadError, web};

use crate::db::{BuildStore, DbPool, ReportStore};
use crate::error::AppError;
use crate::services::{
    AnalyticsSink, ArtifactResolver, Dashboard, DeviceCatalog, PublishQueue, ReportFiller,
    TestReportService, TestingService, WebhookService,
};

pub use dashboard::configure_routes as configure_dashboard_routes;
pub use health::configure_health_routes;
pub use test_assets::configure_routes as configure_asset_routes;
pub use test_matrix::configure_routes as configure_matrix_routes;
pub use test_reports::configure_routes as configure_report_routes;
pub use webhook::configure_routes as configure_webhook_routes;

/// Collaborators the handlers are wired from.
pub struct AppDeps {
    pub testing: Arc<dyn TestingService>,
    pub builds: Arc<dyn BuildStore>,
    pub reports: Arc<dyn ReportStore>,
    pub resolver: Arc<dyn ArtifactResolver>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub catalog: Arc<DeviceCatalog>,
    pub queue: PublishQueue,
    pub http: reqwest::Client,
    /// Bucket holding app binaries and receiving matrix results.
    pub bucket: String,
    pub publish_delay_secs: u64,
    /// Checked by the readiness check when present.
    pub db: Option<DbPool>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub testing: Arc<dyn TestingService>,
    pub builds: Arc<dyn BuildStore>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub catalog: Arc<DeviceCatalog>,
    pub resolver: Arc<dyn ArtifactResolver>,
    pub filler: ReportFiller,
    pub dashboard: Dashboard,
    pub reports: TestReportService,
    pub webhooks: WebhookService,
    pub bucket: String,
    pub db: Option<DbPool>,
}

impl AppState {
    pub fn new(deps: AppDeps) -> Self {
        let filler = ReportFiller::new(Arc::clone(&deps.resolver), deps.http);
        let dashboard = Dashboard::new(
            Arc::clone(&deps.testing),
            Arc::clone(&deps.builds),
            Arc::clone(&deps.reports),
            Arc::clone(&deps.catalog),
            Arc::clone(&deps.resolver),
            filler.clone(),
        );
        let webhooks = WebhookService::new(
            Arc::clone(&deps.testing),
            Arc::clone(&deps.builds),
            Arc::clone(&deps.reports),
            Arc::clone(&deps.analytics),
            dashboard.clone(),
            filler.clone(),
        );
        let reports = TestReportService::new(
            deps.reports,
            Arc::clone(&deps.resolver),
            deps.queue,
            deps.publish_delay_secs,
        );

        AppState {
            testing: deps.testing,
            builds: deps.builds,
            analytics: deps.analytics,
            catalog: deps.catalog,
            resolver: deps.resolver,
            filler,
            dashboard,
            reports,
            webhooks,
            bucket: deps.bucket,
            db: deps.db,
        }
    }
}

/// Register every `/api/v1` route.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health_routes)
        .configure(configure_matrix_routes)
        .configure(configure_asset_routes)
        .configure(configure_dashboard_routes)
        .configure(configure_report_routes)
        .configure(configure_webhook_routes);
}

/// Report malformed JSON bodies in the service's error format.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::InvalidInput(format!("Invalid JSON body: {}", err)).into()
}
