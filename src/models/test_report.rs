//! Test report records and their filled form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::junit::Suite;

/// Metadata of the CI step that produced a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StepInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub number: i64,
}

/// File uploaded next to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReportAsset {
    pub id: Uuid,
    pub test_report_id: Uuid,
    pub filename: String,
    pub filesize: i64,
    pub uploaded: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored JUnit report of one CI step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub filesize: i64,
    /// Raw step metadata as sent by the CI step.
    pub step: serde_json::Value,
    pub uploaded: bool,
    pub app_slug: String,
    pub build_slug: String,
    pub created_at: DateTime<Utc>,
    pub assets: Vec<TestReportAsset>,
}

impl TestReport {
    /// Object path of the report file.
    pub fn path_in_bucket(&self) -> String {
        format!(
            "builds/{}/test_reports/{}/{}",
            self.build_slug, self.id, self.filename
        )
    }

    /// Object path of one of the report's assets.
    pub fn asset_path_in_bucket(&self, asset: &TestReportAsset) -> String {
        format!(
            "builds/{}/test_reports/{}/assets/{}",
            self.build_slug, asset.test_report_id, asset.filename
        )
    }

    /// Decode the stored step metadata.
    pub fn step_info(&self) -> Result<StepInfo, serde_json::Error> {
        serde_json::from_value(self.step.clone())
    }

    /// Name used for the step result posted to CI.
    pub fn result_name(&self, step: &StepInfo) -> String {
        if !self.name.is_empty() && self.name != step.title {
            format!("{} ({})", step.title, self.name)
        } else {
            step.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReportAssetInfo {
    pub filename: String,
    pub filesize: i64,
    pub uploaded: bool,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
}

/// A report merged with its parsed suites and signed asset URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReportWithTestSuites {
    pub id: Uuid,
    pub test_suites: Vec<Suite>,
    pub step_info: StepInfo,
    pub test_assets: Vec<TestReportAssetInfo>,
}

/// Asset announced when registering a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTestReportAsset {
    pub filename: String,
    pub filesize: i64,
}

/// Request body for registering a report upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTestReport {
    #[serde(default)]
    pub name: String,
    pub filename: String,
    pub filesize: i64,
    #[serde(default)]
    pub step: StepInfo,
    #[serde(default)]
    pub assets: Vec<NewTestReportAsset>,
}

impl NewTestReport {
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("filename must be present".to_string());
        }
        if self.filesize <= 0 {
            return Err("filesize must be greater than 0".to_string());
        }
        for asset in &self.assets {
            if asset.filename.trim().is_empty() || asset.filesize <= 0 {
                return Err(format!("invalid asset '{}'", asset.filename));
            }
        }
        Ok(())
    }
}

/// Partial update of a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestReportPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uploaded: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReportAssetUpload {
    #[serde(flatten)]
    pub asset: TestReportAsset,
    pub upload_url: String,
}

/// Registered report with signed upload URLs for it and its assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReportUpload {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub filesize: i64,
    pub step: serde_json::Value,
    pub uploaded: bool,
    pub app_slug: String,
    pub build_slug: String,
    pub created_at: DateTime<Utc>,
    pub upload_url: String,
    pub assets: Vec<TestReportAssetUpload>,
}
