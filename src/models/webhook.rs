//! CI build lifecycle notifications.

use serde::{Deserialize, Serialize};

use super::summary::Totals;

/// CI status code of an aborted build.
pub const ABORTED_BUILD_STATUS: i64 = 3;

/// Value of the event type header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiEventType {
    BuildTriggered,
    BuildFinished,
}

impl CiEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "build/triggered" => Some(CiEventType::BuildTriggered),
            "build/finished" => Some(CiEventType::BuildFinished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitData {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub src_branch: String,
    #[serde(default)]
    pub dst_branch: String,
    #[serde(default)]
    pub pull_request_id: i64,
}

/// Body of a build webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub app_slug: String,
    pub build_slug: String,
    #[serde(default)]
    pub build_number: i64,
    #[serde(default)]
    pub build_status: i64,
    #[serde(default)]
    pub build_triggered_workflow: String,
    #[serde(default)]
    pub git: GitData,
}

impl BuildEvent {
    pub fn is_aborted(&self) -> bool {
        self.build_status == ABORTED_BUILD_STATUS
    }
}

/// Verdict over a finished build's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryResult {
    Fail,
    Success,
    Empty,
}

impl SummaryResult {
    /// Failures or inconclusive outcomes fail the build; no results at all is empty.
    pub fn from_totals(totals: &Totals) -> Self {
        if totals.failed > 0 || totals.inconclusive > 0 {
            SummaryResult::Fail
        } else if *totals == Totals::default() {
            SummaryResult::Empty
        } else {
            SummaryResult::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryResult::Fail => "fail",
            SummaryResult::Success => "success",
            SummaryResult::Empty => "empty",
        }
    }
}

/// Response of the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub app_slug: String,
    pub build_slug: String,
    /// Present once a finished build was summarized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryResult>,
}
