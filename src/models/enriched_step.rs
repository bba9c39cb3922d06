//! Dashboard view of an execution step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Test mode inferred from the artifacts a step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Robo,
    Instrumentation,
}

/// Signed URLs of the artifacts of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputUrls {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshot_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_map_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_suite_xml_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestIssue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stacktrace: String,
}

/// Per-suite counters copied from the step's suite overviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestResults {
    pub total: i64,
    pub failed: i64,
    pub skipped: i64,
}

/// One execution step enriched with readable dimensions and signed artifact URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnrichedStep {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestResults>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outcome: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub orientation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step_id: String,
    #[serde(default)]
    pub output_urls: OutputUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_type: Option<TestType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_issues: Vec<TestIssue>,
    #[serde(default)]
    pub step_duration_in_seconds: i64,
}

impl EnrichedStep {
    /// Match a dashboard status filter against the step.
    ///
    /// Steps still running always match; otherwise the outcome must equal the
    /// filter, with `passed`/`failed` accepted for `success`/`failure`.
    pub fn matches_status(&self, status: &str) -> bool {
        if self.status == "inProgress" {
            return true;
        }
        self.outcome == status
            || (self.outcome == "success" && status == "passed")
            || (self.outcome == "failure" && status == "failed")
    }
}
