//! Test matrix polling.
//!
//! A build moves from "matrix requested" to "steps known" once the remote
//! matrix reports its tool-results history and execution. Until then each
//! poll only fetches the matrix state; afterwards it lists the steps.

use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::BuildStore;
use crate::error::{AppError, AppResult};
use crate::models::matrix::MatrixState;
use crate::models::step::{ExecutionStep, StepState};
use crate::models::Build;

use super::analytics::{self, AnalyticsSink, DeviceProps, Platform};
use super::testing_service::TestingService;

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PollResult {
    /// Steps are not known yet.
    Pending { state: MatrixState },
    Steps { steps: Vec<ExecutionStep> },
}

/// Run `op`, retrying it once immediately on failure.
///
/// A second failure is reported as `TransientUpstream`.
pub async fn retry_once<T, F, Fut>(operation: &str, op: F) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(operation = %operation, error = %first, "Remote call failed, retrying once");
            op().await.map_err(|e| match e {
                AppError::TransientUpstream(_) => e,
                other => AppError::TransientUpstream(format!("{}: {}", operation, other)),
            })
        }
    }
}

/// Poll the test run of a build.
pub async fn poll_test_execution(
    testing: &dyn TestingService,
    builds: &dyn BuildStore,
    analytics: &dyn AnalyticsSink,
    app_slug: &str,
    build_slug: &str,
) -> AppResult<PollResult> {
    let mut build = builds
        .find_build(app_slug, build_slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Build".to_string()))?;

    if build.needs_result_ids() {
        if build.test_matrix_id.is_empty() {
            return Err(AppError::NotFound("Test matrix".to_string()));
        }

        let matrix_id = build.test_matrix_id.clone();
        let matrix = retry_once("get test matrix", || testing.get_matrix(&matrix_id)).await?;

        if matrix.state.is_error() {
            warn!(
                app_slug = %app_slug,
                build_slug = %build_slug,
                state = %matrix.state,
                details = %matrix.invalid_matrix_details,
                "Test matrix ended in an error state"
            );
            return Err(AppError::UpstreamState {
                state: matrix.state.to_string(),
                details: matrix.invalid_matrix_details.clone(),
            });
        }

        match matrix.result_ids() {
            Some((history_id, execution_id)) => {
                build.test_history_id = history_id.to_string();
                build.test_execution_id = execution_id.to_string();
                build = builds.save_build(&build).await?;
                info!(
                    app_slug = %app_slug,
                    build_slug = %build_slug,
                    history_id = %build.test_history_id,
                    execution_id = %build.test_execution_id,
                    "Test execution ids received"
                );
            }
            None => {
                build.last_request = Some(Utc::now());
                builds.save_build(&build).await?;
                return Ok(PollResult::Pending {
                    state: matrix.state,
                });
            }
        }
    }

    let history_id = build.test_history_id.clone();
    let execution_id = build.test_execution_id.clone();
    let steps = retry_once("list steps", || {
        testing.list_steps(&history_id, &execution_id)
    })
    .await?;

    if build.build_session_enabled && all_complete(&steps) {
        build.build_session_enabled = false;
        build.test_end_time = Some(Utc::now());
        send_finished_events(analytics, &build, &steps);
    }

    build.last_request = Some(Utc::now());
    builds.save_build(&build).await?;

    Ok(PollResult::Steps { steps })
}

/// A run is complete once it has steps and every one of them finished.
fn all_complete(steps: &[ExecutionStep]) -> bool {
    !steps.is_empty() && steps.iter().all(|step| step.state == StepState::Complete)
}

fn device_of(step: &ExecutionStep) -> DeviceProps {
    let mut device = DeviceProps::default();
    for dimension in &step.dimension_value {
        match dimension.key.as_str() {
            "Model" => device.device_id = dimension.value.clone(),
            "Version" => device.os_version = dimension.value.clone(),
            "Locale" => device.language = dimension.value.clone(),
            "Orientation" => device.orientation = dimension.value.clone(),
            _ => {}
        }
    }
    device
}

fn send_finished_events(analytics: &dyn AnalyticsSink, build: &Build, steps: &[ExecutionStep]) {
    let test_type = match steps.first() {
        Some(step) if step.name.to_lowercase().contains("instrumentation") => "instrumentation",
        _ => "robo",
    };
    let platform = if steps.iter().any(ExecutionStep::is_ios) {
        Platform::Ios
    } else {
        Platform::Android
    };
    let result = if steps.iter().all(|s| s.outcome_summary() == "success") {
        "success"
    } else {
        "failed"
    };

    for step in steps {
        analytics::send_device_events(
            analytics,
            platform.finished_on_device_event(),
            &build.app_slug,
            &build.build_slug,
            test_type,
            &[device_of(step)],
            &[("test_result", step.outcome_summary())],
        );
    }
    analytics::send_run_event(
        analytics,
        platform.finished_event(),
        &build.app_slug,
        &build.build_slug,
        test_type,
        &[("test_result", result)],
    );

    info!(
        app_slug = %build.app_slug,
        build_slug = %build.build_slug,
        test_type = %test_type,
        result = %result,
        "Test run finished"
    );
}
