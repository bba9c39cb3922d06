//! Execution step records as returned by the remote tool-results API.
//!
//! The remote service omits nested objects freely, so every nested record is
//! optional. 64-bit integers arrive as JSON strings; both strings and numbers
//! are accepted.

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle state of an execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum StepState {
    Pending,
    InProgress,
    Complete,
    #[default]
    #[serde(other)]
    Unknown,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::InProgress => "inProgress",
            StepState::Complete => "complete",
            StepState::Unknown => "unknownState",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// success, failure, inconclusive, skipped or unset
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DimensionValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    #[serde(default)]
    pub file_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutputReference {
    #[serde(default)]
    pub output: Option<FileReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    #[serde(default)]
    pub tool_logs: Vec<FileReference>,
    #[serde(default)]
    pub tool_outputs: Vec<ToolOutputReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(default)]
    pub exception: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestIssue {
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub stack_trace: Option<StackTrace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Duration {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestTiming {
    #[serde(default)]
    pub test_process_duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteOverview {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_count: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub failure_count: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub skipped_count: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub error_count: i64,
    #[serde(default)]
    pub xml_source: Option<FileReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionStep {
    #[serde(default)]
    pub test_issues: Vec<TestIssue>,
    #[serde(default)]
    pub test_timing: Option<TestTiming>,
    #[serde(default)]
    pub test_suite_overviews: Vec<TestSuiteOverview>,
    #[serde(default)]
    pub tool_execution: Option<ToolExecution>,
}

/// One execution step of a test matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    #[serde(default)]
    pub step_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: StepState,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub dimension_value: Vec<DimensionValue>,
    #[serde(default)]
    pub test_execution_step: Option<TestExecutionStep>,
}

impl ExecutionStep {
    /// Outcome summary, empty when the step has none yet.
    pub fn outcome_summary(&self) -> &str {
        self.outcome
            .as_ref()
            .and_then(|o| o.summary.as_deref())
            .unwrap_or_default()
    }

    /// Whether the step name marks an iOS run.
    pub fn is_ios(&self) -> bool {
        self.name.to_lowercase().contains("ios")
    }
}

/// Page of steps returned by the list-steps call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListStepsResponse {
    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::Text(s)) if s.is_empty() => Ok(0),
        Some(NumberOrString::Text(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}
