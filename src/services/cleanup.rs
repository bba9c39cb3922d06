//! Closing build sessions that stopped sending requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::CleanupSettings;
use crate::db::BuildStore;
use crate::error::{AppError, AppResult};

use super::testing_service::TestingService;

/// Start the session cleanup background task.
pub fn start_build_cleanup(
    testing: Arc<dyn TestingService>,
    builds: Arc<dyn BuildStore>,
    settings: CleanupSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting build session cleanup (timeout: {}s, interval: {}s)",
            settings.session_timeout_secs, settings.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(settings.interval_secs.max(1)));

        loop {
            ticker.tick().await;

            let timeout = settings.session_timeout_secs;
            if let Err(e) = run_cleanup(testing.as_ref(), builds.as_ref(), timeout).await {
                error!("Build cleanup error: {}", e);
            }
        }
    })
}

/// Close every open session idle for at least `timeout_secs`.
///
/// The session flag is cleared before the matrix is cancelled, so a failing
/// cancel is not retried on the next cycle. Returns the number of sessions closed.
pub async fn run_cleanup(
    testing: &dyn TestingService,
    builds: &dyn BuildStore,
    timeout_secs: u64,
) -> AppResult<usize> {
    let timeout = i64::try_from(timeout_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| {
            AppError::InvalidInput(format!("Session timeout out of range: {}s", timeout_secs))
        })?;
    let cutoff = Utc::now() - timeout;

    let expired = builds.list_expired_open_builds(cutoff).await?;
    if expired.is_empty() {
        return Ok(0);
    }

    info!(count = expired.len(), "Closing expired build sessions");

    for mut build in expired.iter().cloned() {
        build.build_session_enabled = false;
        builds.save_build(&build).await?;

        if build.test_matrix_id.is_empty() {
            continue;
        }

        match testing.cancel_matrix(&build.test_matrix_id).await {
            Ok(()) => info!(
                app_slug = %build.app_slug,
                build_slug = %build.build_slug,
                matrix_id = %build.test_matrix_id,
                "Cancelled test matrix of expired session"
            ),
            Err(e) => warn!(
                app_slug = %build.app_slug,
                build_slug = %build.build_slug,
                matrix_id = %build.test_matrix_id,
                error = %e,
                "Failed to cancel test matrix of expired session"
            ),
        }
    }

    Ok(expired.len())
}
