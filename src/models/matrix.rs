//! Test matrix resources of the remote testing service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Matrix state as reported by the testing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixState {
    Unspecified,
    Validating,
    Pending,
    Running,
    Finished,
    Error,
    UnsupportedEnvironment,
    IncompatibleEnvironment,
    IncompatibleArchitecture,
    Cancelled,
    Invalid,
    Other(String),
}

impl MatrixState {
    pub fn parse(s: &str) -> Self {
        match s {
            "" | "TEST_STATE_UNSPECIFIED" => MatrixState::Unspecified,
            "VALIDATING" => MatrixState::Validating,
            "PENDING" => MatrixState::Pending,
            "RUNNING" => MatrixState::Running,
            "FINISHED" => MatrixState::Finished,
            "ERROR" => MatrixState::Error,
            "UNSUPPORTED_ENVIRONMENT" => MatrixState::UnsupportedEnvironment,
            "INCOMPATIBLE_ENVIRONMENT" => MatrixState::IncompatibleEnvironment,
            "INCOMPATIBLE_ARCHITECTURE" => MatrixState::IncompatibleArchitecture,
            "CANCELLED" => MatrixState::Cancelled,
            "INVALID" => MatrixState::Invalid,
            other => MatrixState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MatrixState::Unspecified => "TEST_STATE_UNSPECIFIED",
            MatrixState::Validating => "VALIDATING",
            MatrixState::Pending => "PENDING",
            MatrixState::Running => "RUNNING",
            MatrixState::Finished => "FINISHED",
            MatrixState::Error => "ERROR",
            MatrixState::UnsupportedEnvironment => "UNSUPPORTED_ENVIRONMENT",
            MatrixState::IncompatibleEnvironment => "INCOMPATIBLE_ENVIRONMENT",
            MatrixState::IncompatibleArchitecture => "INCOMPATIBLE_ARCHITECTURE",
            MatrixState::Cancelled => "CANCELLED",
            MatrixState::Invalid => "INVALID",
            MatrixState::Other(s) => s,
        }
    }

    /// Terminal failure states. Polling stops on any of them.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            MatrixState::Error
                | MatrixState::UnsupportedEnvironment
                | MatrixState::IncompatibleEnvironment
                | MatrixState::IncompatibleArchitecture
                | MatrixState::Cancelled
                | MatrixState::Invalid
        )
    }
}

impl std::fmt::Display for MatrixState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MatrixState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MatrixState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(MatrixState::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultsStep {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub history_id: String,
    #[serde(default)]
    pub execution_id: String,
    #[serde(default)]
    pub step_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    #[serde(default)]
    pub tool_results_step: Option<ToolResultsStep>,
}

/// Matrix status returned by a get-matrix call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrixStatus {
    #[serde(default)]
    pub test_matrix_id: String,
    #[serde(default = "unspecified")]
    pub state: MatrixState,
    #[serde(default)]
    pub invalid_matrix_details: String,
    #[serde(default)]
    pub test_executions: Vec<TestExecution>,
}

fn unspecified() -> MatrixState {
    MatrixState::Unspecified
}

impl TestMatrixStatus {
    /// Tool-results ids of the first execution, once the service assigned them.
    pub fn result_ids(&self) -> Option<(&str, &str)> {
        let step = self.test_executions.first()?.tool_results_step.as_ref()?;
        if step.history_id.is_empty() || step.execution_id.is_empty() {
            return None;
        }
        Some((step.history_id.as_str(), step.execution_id.as_str()))
    }
}

/// Response of a create-matrix call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartedMatrix {
    #[serde(default)]
    pub test_matrix_id: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AndroidDevice {
    #[serde(default)]
    pub android_model_id: String,
    #[serde(default)]
    pub android_version_id: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IosDevice {
    #[serde(default)]
    pub ios_model_id: String,
    #[serde(default)]
    pub ios_version_id: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AndroidDeviceList {
    #[serde(default)]
    pub android_devices: Vec<AndroidDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IosDeviceList {
    #[serde(default)]
    pub ios_devices: Vec<IosDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMatrix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_device_list: Option<AndroidDeviceList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_device_list: Option<IosDeviceList>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Test specification; the test-kind payloads are passed through untouched
/// apart from the app file references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_instrumentation_test: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_robo_test: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_test_loop: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_xc_test: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Matrix submitted by a CI step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrixRequest {
    #[serde(default)]
    pub test_specification: TestSpecification,
    #[serde(default)]
    pub environment_matrix: EnvironmentMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_storage: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestMatrixRequest {
    pub fn is_ios(&self) -> bool {
        self.test_specification.ios_xc_test.is_some()
    }

    /// Test type label used in analytics events.
    pub fn test_type(&self) -> &'static str {
        if self.test_specification.android_instrumentation_test.is_some() {
            "instrumentation"
        } else {
            "robo"
        }
    }
}
