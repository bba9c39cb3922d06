//! Concurrent enrichment of all steps of one test execution.

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::models::enriched_step::EnrichedStep;
use crate::models::step::ExecutionStep;

use super::catalog::DeviceCatalog;
use super::enrichment::enrich_step;
use super::storage::ArtifactResolver;

/// Write-once error cell shared by enrichment tasks.
///
/// The first recorded error is kept; later ones are dropped.
#[derive(Debug, Default)]
pub struct FirstError(OnceLock<AppError>);

impl FirstError {
    /// Record an error. Returns `false` when another error was already kept.
    pub fn record(&self, err: AppError) -> bool {
        self.0.set(err).is_ok()
    }

    pub fn get(&self) -> Option<&AppError> {
        self.0.get()
    }
}

/// Enrich every step on its own task and return results in input order.
///
/// All tasks are awaited before the error cell is read. When any step fails
/// the whole result is discarded and the first recorded error is returned.
pub async fn aggregate_steps(
    steps: Vec<ExecutionStep>,
    catalog: Arc<DeviceCatalog>,
    resolver: Arc<dyn ArtifactResolver>,
) -> AppResult<Vec<EnrichedStep>> {
    let count = steps.len();
    let first_error = Arc::new(FirstError::default());

    let handles: Vec<_> = steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| {
            let catalog = Arc::clone(&catalog);
            let resolver = Arc::clone(&resolver);
            let first_error = Arc::clone(&first_error);

            let handle = tokio::spawn(async move {
                match enrich_step(&step, &catalog, resolver.as_ref()).await {
                    Ok(enriched) => Some(enriched),
                    Err(e) => {
                        if !first_error.record(e) {
                            debug!(index, step_id = %step.step_id, "Dropping later enrichment error");
                        }
                        None
                    }
                }
            });
            (index, handle)
        })
        .collect();

    let mut slots: Vec<Option<EnrichedStep>> = vec![None; count];
    for (index, handle) in handles {
        match handle.await {
            Ok(result) => slots[index] = result,
            Err(join_error) => {
                error!(index, error = %join_error, "Step enrichment task failed");
                first_error.record(AppError::Internal(format!(
                    "step enrichment task failed: {}",
                    join_error
                )));
            }
        }
    }

    if let Some(err) = first_error.get() {
        return Err(err.clone());
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::enrichment::tests::step_with_outputs;
    use crate::services::storage::fake::FakeResolver;

    fn video_path(i: usize) -> String {
        format!("gs://bucket/artifacts/{}/video.mp4", i)
    }

    fn steps(n: usize) -> Vec<ExecutionStep> {
        (0..n)
            .map(|i| step_with_outputs(&format!("step-{}", i), &[video_path(i).as_str()]))
            .collect()
    }

    #[test]
    fn test_first_error_keeps_first() {
        let cell = FirstError::default();
        assert!(cell.record(AppError::DownloadFailed("first".to_string())));
        assert!(!cell.record(AppError::DownloadFailed("second".to_string())));
        assert!(matches!(cell.get(), Some(AppError::DownloadFailed(m)) if m == "first"));
    }

    #[tokio::test]
    async fn test_order_preserved_with_reverse_completion() {
        let n = 8;
        let mut resolver = FakeResolver::new("bucket");
        for i in 0..n {
            // Earlier steps finish last.
            resolver = resolver.delayed(
                &format!("artifacts/{}/video.mp4", i),
                Duration::from_millis(((n - i) * 15) as u64),
            );
        }

        let result = aggregate_steps(steps(n), Arc::new(DeviceCatalog::empty()), Arc::new(resolver))
            .await
            .unwrap();

        assert_eq!(result.len(), n);
        for (i, step) in result.iter().enumerate() {
            assert_eq!(step.step_id, format!("step-{}", i));
            assert_eq!(
                step.output_urls.video_url.as_deref(),
                Some(format!("https://signed.test/artifacts/{}/video.mp4?sig=get", i).as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_single_error_wins() {
        let resolver = FakeResolver::new("bucket")
            .failing_on("artifacts/2/video.mp4")
            .failing_on("artifacts/5/video.mp4");

        let result =
            aggregate_steps(steps(10), Arc::new(DeviceCatalog::empty()), Arc::new(resolver)).await;

        match result {
            Err(AppError::ArtifactResolutionFailed { path, .. }) => {
                assert!(path == video_path(2) || path == video_path(5), "{}", path);
            }
            other => panic!("expected a single resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_late_failure_is_not_lost() {
        let resolver = FakeResolver::new("bucket")
            .failing_on("artifacts/0/video.mp4")
            .delayed("artifacts/0/video.mp4", Duration::from_millis(50));

        let result =
            aggregate_steps(steps(4), Arc::new(DeviceCatalog::empty()), Arc::new(resolver)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let result = aggregate_steps(
            Vec::new(),
            Arc::new(DeviceCatalog::empty()),
            Arc::new(FakeResolver::new("bucket")),
        )
        .await
        .unwrap();
        assert!(result.is_empty());
    }
}
