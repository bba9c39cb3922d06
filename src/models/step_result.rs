//! Step results posted to the CI system.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::junit::Test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResultStatus {
    Success,
    Failed,
    /// The report contained no test cases.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStepResult {
    pub name: String,
    pub status: StepResultStatus,
    pub total: u64,
    pub failed_tests: Vec<Test>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintStepResult {
    pub name: String,
    pub status: StepResultStatus,
    pub annotations: Vec<Annotation>,
}
