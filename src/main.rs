//! Device test results service - main entry point.
//!
//! Starts the Actix-web server, the step result publish worker and the
//! build session cleanup task.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use device_test_results::api::{self, AppDeps, AppState};
use device_test_results::config::Config;
use device_test_results::db::DbPool;
use device_test_results::middleware;
use device_test_results::services::{
    PublishQueue, PublishWorker, ReportFiller, RestCiClient, RestTestingService,
    S3ArtifactResolver, StepResultPublisher, TracingAnalytics, load_device_catalog,
    start_build_cleanup,
};

/// Timeout of report and artifact downloads.
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| std::io::Error::other(format!("Failed to set tracing subscriber: {}", e)))?;

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL, S3_* and TESTING_* must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Device Test Results");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let pool = DbPool::new(&config.database)
        .await
        .map_err(|e| startup_error("Failed to initialize database", e))?;
    info!("Database connection established");
    pool.run_migrations()
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let resolver = Arc::new(
        S3ArtifactResolver::new(&config.storage)
            .await
            .map_err(|e| startup_error("Failed to initialize storage", e))?,
    );
    let bucket = resolver.bucket().to_string();

    let testing = Arc::new(
        RestTestingService::new(&config.testing)
            .map_err(|e| startup_error("Failed to initialize testing service client", e))?,
    );
    let catalog = Arc::new(load_device_catalog(testing.as_ref()).await);

    let ci = Arc::new(
        RestCiClient::new(&config.ci).map_err(|e| startup_error("Failed to initialize CI client", e))?,
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .map_err(|e| startup_error("Failed to build HTTP client", e))?;

    let store = Arc::new(pool.clone());

    let publisher = StepResultPublisher::new(
        store.clone(),
        store.clone(),
        ReportFiller::new(resolver.clone(), http.clone()),
        ci,
        config.queue.clone(),
    );
    PublishWorker::new(store.clone(), Arc::new(publisher), config.queue.clone()).start();
    start_build_cleanup(testing.clone(), store.clone(), config.cleanup.clone());

    let state = web::Data::new(AppState::new(AppDeps {
        testing,
        builds: store.clone(),
        reports: store.clone(),
        resolver,
        analytics: Arc::new(TracingAnalytics),
        catalog,
        queue: PublishQueue::new(store),
        http,
        bucket,
        publish_delay_secs: config.queue.publish_delay_secs,
        db: Some(pool),
    }));

    let bind_address = config.bind_address();
    let worker_count = if config.is_development() {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!("Starting server at http://{} ({} workers)", bind_address, cpus);
        cpus
    };

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::RequestLogger)
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(api::json_error_handler))
            .service(web::scope("/api/v1").configure(api::configure_routes))
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
