//! Turns a raw execution step into its dashboard view.

use tracing::error;

use crate::error::AppResult;
use crate::models::enriched_step::{EnrichedStep, OutputUrls, TestIssue, TestResults, TestType};
use crate::models::step::{ExecutionStep, TestExecutionStep, ToolExecution};

use super::catalog::DeviceCatalog;
use super::storage::ArtifactResolver;

const RESULTS_SEGMENT: &str = "results/";
const VIDEO_SUFFIX: &str = "video.mp4";
const ACTIVITY_MAP_SUFFIX: &str = "sitemap.png";
const SCREENSHOT_SUFFIX: &str = ".png";

/// Roles a tool output file plays in the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputClass {
    /// Key under which the file is listed as a generic asset.
    pub asset_key: Option<String>,
    pub video: bool,
    pub activity_map: bool,
    pub screenshot: bool,
}

impl OutputClass {
    pub fn is_empty(&self) -> bool {
        self.asset_key.is_none() && !self.video && !self.activity_map && !self.screenshot
    }
}

/// Classify a tool output path. Each pattern is checked on its own.
pub fn classify_output(path: &str) -> OutputClass {
    let asset_key = path.split_once(RESULTS_SEGMENT).map(|(_, rest)| {
        // Drop the per-device directory right below `results/`.
        rest.split_once('/')
            .map(|(_, key)| key.to_string())
            .unwrap_or_default()
    });

    OutputClass {
        asset_key,
        video: path.ends_with(VIDEO_SUFFIX),
        activity_map: path.ends_with(ACTIVITY_MAP_SUFFIX),
        screenshot: path.ends_with(SCREENSHOT_SUFFIX) && !path.ends_with(ACTIVITY_MAP_SUFFIX),
    }
}

async fn sign(resolver: &dyn ArtifactResolver, path: &str, step_id: &str) -> AppResult<String> {
    resolver.resolve(path).await.inspect_err(|e| {
        error!(step_id = %step_id, file_uri = %path, error = %e, "Failed to get signed url");
    })
}

async fn collect_tool_outputs(
    tools: &ToolExecution,
    resolver: &dyn ArtifactResolver,
    step_id: &str,
    urls: &mut OutputUrls,
) -> AppResult<()> {
    for log in &tools.tool_logs {
        if log.file_uri.is_empty() {
            continue;
        }
        urls.log_urls
            .push(sign(resolver, &log.file_uri, step_id).await?);
    }

    for output in &tools.tool_outputs {
        let Some(file) = output.output.as_ref().filter(|f| !f.file_uri.is_empty()) else {
            continue;
        };

        let class = classify_output(&file.file_uri);
        if class.is_empty() {
            continue;
        }

        let url = sign(resolver, &file.file_uri, step_id).await?;
        if let Some(key) = class.asset_key {
            urls.asset_urls.insert(key, url.clone());
        }
        if class.video {
            urls.video_url = Some(url.clone());
        }
        if class.activity_map {
            urls.activity_map_url = Some(url.clone());
        }
        if class.screenshot {
            urls.screenshot_urls.push(url);
        }
    }

    Ok(())
}

async fn collect_execution(
    execution: &TestExecutionStep,
    resolver: &dyn ArtifactResolver,
    step_id: &str,
    enriched: &mut EnrichedStep,
) -> AppResult<()> {
    enriched.test_issues = execution
        .test_issues
        .iter()
        .map(|issue| TestIssue {
            name: issue.error_message.clone(),
            summary: String::new(),
            stacktrace: issue
                .stack_trace
                .as_ref()
                .map(|s| s.exception.clone())
                .unwrap_or_default(),
        })
        .collect();

    if let Some(duration) = execution
        .test_timing
        .as_ref()
        .and_then(|t| t.test_process_duration.as_ref())
    {
        enriched.step_duration_in_seconds = duration.seconds;
    }

    enriched.test_results = execution
        .test_suite_overviews
        .iter()
        .map(|overview| TestResults {
            total: overview.total_count,
            failed: overview.failure_count,
            skipped: overview.skipped_count,
        })
        .collect();

    let mut urls = OutputUrls::default();

    if let Some(tools) = &execution.tool_execution {
        collect_tool_outputs(tools, resolver, step_id, &mut urls).await?;
    }

    for overview in &execution.test_suite_overviews {
        let Some(source) = overview
            .xml_source
            .as_ref()
            .filter(|s| !s.file_uri.is_empty())
        else {
            continue;
        };
        urls.test_suite_xml_url = Some(sign(resolver, &source.file_uri, step_id).await?);
    }

    enriched.output_urls = urls;
    Ok(())
}

/// Enrich one execution step.
///
/// Unknown dimension keys are ignored and unknown devices or locales keep
/// their raw id. Any artifact that fails to resolve fails the whole step.
pub async fn enrich_step(
    step: &ExecutionStep,
    catalog: &DeviceCatalog,
    resolver: &dyn ArtifactResolver,
) -> AppResult<EnrichedStep> {
    let mut enriched = EnrichedStep::default();

    for dimension in &step.dimension_value {
        match dimension.key.as_str() {
            "Model" => enriched.device_name = catalog.device_name(&dimension.value),
            "Version" => {
                let prefix = if step.is_ios() { "iOS" } else { "API Level" };
                enriched.api_level = format!("{} {}", prefix, dimension.value);
            }
            "Locale" => enriched.locale = catalog.locale_name(&dimension.value),
            "Orientation" => enriched.orientation = dimension.value.clone(),
            _ => {}
        }
    }

    enriched.outcome = step.outcome_summary().to_string();
    enriched.status = step.state.as_str().to_string();
    enriched.step_id = step.step_id.clone();

    if let Some(execution) = &step.test_execution_step {
        collect_execution(execution, resolver, &step.step_id, &mut enriched).await?;
    }

    if enriched.output_urls.activity_map_url.is_some() {
        enriched.test_type = Some(TestType::Robo);
    }
    if enriched.output_urls.test_suite_xml_url.is_some() {
        enriched.test_type = Some(TestType::Instrumentation);
    }

    Ok(enriched)
}
