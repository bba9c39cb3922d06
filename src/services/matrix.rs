//! Starting and cancelling test matrices.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::db::BuildStore;
use crate::error::{AppError, AppResult};
use crate::models::matrix::{TestMatrixRequest, TestSpecification};
use crate::models::Build;

use super::analytics::{self, AnalyticsSink, DeviceProps, Platform};
use super::catalog::DeviceCatalog;
use super::testing_service::TestingService;

pub const ANDROID_MAX_TIMEOUT_SECS: u64 = 3600;
pub const IOS_MAX_TIMEOUT_SECS: u64 = 1800;

/// Collaborators needed to start a matrix.
pub struct MatrixContext<'a> {
    pub testing: &'a dyn TestingService,
    pub builds: &'a dyn BuildStore,
    pub analytics: &'a dyn AnalyticsSink,
    pub catalog: &'a DeviceCatalog,
    /// Bucket holding app binaries and receiving results.
    pub bucket: &'a str,
}

/// Upper bound of `testTimeout` for the requested test kind.
pub fn max_timeout_secs(spec: &TestSpecification) -> Option<u64> {
    if spec.android_instrumentation_test.is_some()
        || spec.android_robo_test.is_some()
        || spec.android_test_loop.is_some()
    {
        Some(ANDROID_MAX_TIMEOUT_SECS)
    } else if spec.ios_xc_test.is_some() {
        Some(IOS_MAX_TIMEOUT_SECS)
    } else {
        None
    }
}

/// Lower an over-limit `testTimeout` ("NNNs") to the limit.
///
/// Returns the limit when the value was overridden. Unparseable values are
/// left for the testing service to reject.
pub fn clamp_timeout(spec: &mut TestSpecification) -> Option<u64> {
    let max = max_timeout_secs(spec)?;
    let timeout = spec.test_timeout.as_deref()?;
    let secs: f64 = timeout.trim_end_matches('s').parse().ok()?;

    if secs > max as f64 {
        spec.test_timeout = Some(format!("{}s", max));
        Some(max)
    } else {
        None
    }
}

pub(crate) fn app_path(bucket: &str, build_slug: &str, file: &str) -> String {
    format!("gs://{}/android-tests/{}/{}", bucket, build_slug, file)
}

pub(crate) fn results_path(bucket: &str, build_slug: &str) -> String {
    format!("gs://{}/android-tests/{}/results/", bucket, build_slug)
}

fn set_file(spec: &mut Option<Map<String, Value>>, field: &str, gcs_path: String) {
    if let Some(test) = spec.as_mut() {
        test.insert(field.to_string(), json!({ "gcsPath": gcs_path }));
    }
}

/// Point the request at the uploaded binaries and the results location.
pub fn prepare_request(
    request: &mut TestMatrixRequest,
    bucket: &str,
    build_slug: &str,
    project_id: &str,
    history_id: &str,
) {
    let app_apk = app_path(bucket, build_slug, "app.apk");
    let test_apk = app_path(bucket, build_slug, "app-test.apk");
    let spec = &mut request.test_specification;

    set_file(&mut spec.android_instrumentation_test, "appApk", app_apk.clone());
    set_file(&mut spec.android_instrumentation_test, "testApk", test_apk.clone());
    set_file(&mut spec.android_robo_test, "appApk", app_apk.clone());
    set_file(&mut spec.android_test_loop, "appApk", test_apk);
    set_file(&mut spec.ios_xc_test, "testsZip", app_apk);

    request.result_storage = Some(json!({
        "googleCloudStorage": { "gcsPath": results_path(bucket, build_slug) },
        "toolResultsHistory": { "projectId": project_id, "historyId": history_id },
    }));
}

fn validate_devices(catalog: &DeviceCatalog, request: &TestMatrixRequest) -> AppResult<()> {
    if let Some(list) = &request.environment_matrix.android_device_list {
        for device in &list.android_devices {
            catalog
                .validate_android_device(&device.android_model_id, &device.android_version_id)
                .map_err(|e| {
                    AppError::InvalidInput(format!("Invalid device configuration: {}", e))
                })?;
        }
    }
    Ok(())
}

/// Start a test matrix for a build.
///
/// A build without a record yet gets one with its session flag set.
pub async fn start_test_matrix(
    ctx: &MatrixContext<'_>,
    app_slug: &str,
    build_slug: &str,
    mut request: TestMatrixRequest,
) -> AppResult<Build> {
    let mut build = match ctx.builds.find_build(app_slug, build_slug).await? {
        Some(build) => build,
        None => Build {
            build_session_enabled: true,
            ..Build::new(app_slug, build_slug)
        },
    };

    if !build.test_matrix_id.is_empty() {
        return Err(AppError::Conflict(
            "A Test Matrix has already been started for this build.".to_string(),
        ));
    }

    validate_devices(ctx.catalog, &request)?;

    if let Some(max) = clamp_timeout(&mut request.test_specification) {
        warn!(
            app_slug = %app_slug,
            build_slug = %build_slug,
            max_secs = max,
            "Test timeout exceeds limit, overriding"
        );
    }

    let history_id = ctx.testing.ensure_history(app_slug).await?;
    prepare_request(
        &mut request,
        ctx.bucket,
        build_slug,
        ctx.testing.project_id(),
        &history_id,
    );

    let started = ctx.testing.create_matrix(&request, build_slug).await?;
    let start_time = DateTime::parse_from_rfc3339(&started.timestamp)
        .map_err(|e| {
            AppError::Internal(format!(
                "Invalid matrix timestamp '{}': {}",
                started.timestamp, e
            ))
        })?
        .with_timezone(&Utc);

    build.test_matrix_id = started.test_matrix_id;
    build.test_start_time = Some(start_time);
    build.test_end_time = Some(start_time);
    build.last_request = Some(Utc::now());
    let build = ctx.builds.save_build(&build).await?;

    info!(
        app_slug = %app_slug,
        build_slug = %build_slug,
        matrix_id = %build.test_matrix_id,
        history_id = %history_id,
        "Test matrix started"
    );

    send_started_events(ctx.analytics, &build, &request);
    Ok(build)
}

fn send_started_events(sink: &dyn AnalyticsSink, build: &Build, request: &TestMatrixRequest) {
    let (platform, test_type, devices): (Platform, &str, Vec<DeviceProps>) = if request.is_ios() {
        let devices = request
            .environment_matrix
            .ios_device_list
            .as_ref()
            .map(|l| l.ios_devices.iter().map(DeviceProps::from).collect())
            .unwrap_or_default();
        (Platform::Ios, "", devices)
    } else {
        let devices = request
            .environment_matrix
            .android_device_list
            .as_ref()
            .map(|l| l.android_devices.iter().map(DeviceProps::from).collect())
            .unwrap_or_default();
        (Platform::Android, request.test_type(), devices)
    };

    analytics::send_run_event(
        sink,
        platform.started_event(),
        &build.app_slug,
        &build.build_slug,
        test_type,
        &[],
    );
    analytics::send_device_events(
        sink,
        platform.started_on_device_event(),
        &build.app_slug,
        &build.build_slug,
        test_type,
        &devices,
        &[],
    );
}

/// Cancel the running matrix of a build.
pub async fn cancel_test_matrix(
    testing: &dyn TestingService,
    builds: &dyn BuildStore,
    app_slug: &str,
    build_slug: &str,
) -> AppResult<()> {
    let build = builds
        .find_build(app_slug, build_slug)
        .await?
        .filter(|b| !b.test_matrix_id.is_empty())
        .ok_or_else(|| AppError::NotFound("Test matrix".to_string()))?;

    testing.cancel_matrix(&build.test_matrix_id).await?;
    info!(
        app_slug = %app_slug,
        build_slug = %build_slug,
        matrix_id = %build.test_matrix_id,
        "Test matrix cancelled"
    );
    Ok(())
}
