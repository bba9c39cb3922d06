//! Build-level totals across reports and execution steps.

use serde::{Deserialize, Serialize};

use super::enriched_step::EnrichedStep;
use super::test_report::TestReportWithTestSuites;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Totals {
    pub tests: u64,
    pub passed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub inconclusive: u64,
}

/// Response body of the build summary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestSummary {
    pub totals: Totals,
}

impl Totals {
    /// Add the suite totals of a filled report. Errors count as failures.
    pub fn add_report(&mut self, report: &TestReportWithTestSuites) {
        for suite in &report.test_suites {
            self.tests += suite.totals.tests;
            self.passed += suite.totals.passed;
            self.skipped += suite.totals.skipped;
            self.failed += suite.totals.failed + suite.totals.error;
        }
    }

    /// Count one enriched step by outcome. `tests` only counts report test cases.
    pub fn add_step(&mut self, step: &EnrichedStep) {
        match step.outcome.as_str() {
            "success" => self.passed += 1,
            "failure" => self.failed += 1,
            "skipped" => self.skipped += 1,
            "inconclusive" => self.inconclusive += 1,
            _ => {}
        }
    }
}
