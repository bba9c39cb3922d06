//! Upload and download URLs for device test binaries and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Optional body of an upload URL request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestAssetsRequest {
    /// Expansion file names to sign alongside the APKs.
    #[serde(default)]
    pub obb_files: Vec<String>,
}

/// Signed upload URLs handed to the CI step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAssetUploadUrls {
    pub app_url: String,
    pub test_app_url: String,
    /// Upload URL per requested expansion file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub obb_urls: BTreeMap<String, String>,
}
