//! JUnit suite and test case model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Passed,
    Skipped,
    Failed,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Skipped => "skipped",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
        }
    }

    /// Whether this status satisfies a status filter. `error` counts as `failed`.
    pub fn matches_filter(&self, filter: &str) -> bool {
        self.as_str() == filter || (*self == TestStatus::Error && filter == "failed")
    }
}

/// Failure, error or skip details attached to a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestError {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Test {
    pub name: String,
    #[serde(default)]
    pub classname: String,
    #[serde(default)]
    pub duration_ms: u64,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
    /// Attributes of the `<testcase>` element.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_out: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_err: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    pub tests: u64,
    pub passed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub error: u64,
    pub duration_ms: u64,
}

impl Totals {
    /// Count one test case.
    pub fn add_test(&mut self, test: &Test) {
        self.tests += 1;
        self.duration_ms += test.duration_ms;
        match test.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.error += 1,
        }
    }

    pub fn merge(&mut self, other: &Totals) {
        self.tests += other.tests;
        self.passed += other.passed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.error += other.error;
        self.duration_ms += other.duration_ms;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Suite {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suites: Vec<Suite>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_out: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_err: String,
    #[serde(default)]
    pub totals: Totals,
}

impl Suite {
    /// Recompute totals from own tests and nested suites.
    pub fn aggregate(&mut self) {
        let mut totals = Totals::default();
        for test in &self.tests {
            totals.add_test(test);
        }
        for suite in &mut self.suites {
            suite.aggregate();
            totals.merge(&suite.totals);
        }
        self.totals = totals;
    }
}
