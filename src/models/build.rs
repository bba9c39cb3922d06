//! App and build records tracked for test matrices.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

/// Tenant app with its CI credential.
#[derive(Debug, Clone)]
pub struct App {
    pub app_slug: String,
    /// Token used to authenticate against the CI API.
    pub ci_api_token: SecretString,
}

/// Test matrix bookkeeping of one CI build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Build {
    pub app_slug: String,
    pub build_slug: String,
    pub build_session_enabled: bool,
    pub test_matrix_id: String,
    pub test_history_id: String,
    pub test_execution_id: String,
    pub test_start_time: Option<DateTime<Utc>>,
    pub test_end_time: Option<DateTime<Utc>>,
    pub last_request: Option<DateTime<Utc>>,
}

impl Build {
    pub fn new(app_slug: impl Into<String>, build_slug: impl Into<String>) -> Self {
        Build {
            app_slug: app_slug.into(),
            build_slug: build_slug.into(),
            ..Default::default()
        }
    }

    /// Whether the tool-results ids are still unknown.
    pub fn needs_result_ids(&self) -> bool {
        self.test_history_id.is_empty() || self.test_execution_id.is_empty()
    }
}
