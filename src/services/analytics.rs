//! Usage analytics for started and finished test runs.

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::models::matrix::{AndroidDevice, IosDevice};

/// Platform a test run targets; selects the event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn started_event(self) -> &'static str {
        match self {
            Platform::Android => "vdt_android_addon_test_started",
            Platform::Ios => "vdt_ios_addon_test_started",
        }
    }

    pub fn finished_event(self) -> &'static str {
        match self {
            Platform::Android => "vdt_android_addon_test_finished",
            Platform::Ios => "vdt_ios_addon_test_finished",
        }
    }

    pub fn started_on_device_event(self) -> &'static str {
        match self {
            Platform::Android => "vdt_android_addon_test_started_on_device",
            Platform::Ios => "vdt_ios_addon_test_started_on_device",
        }
    }

    pub fn finished_on_device_event(self) -> &'static str {
        match self {
            Platform::Android => "vdt_android_addon_test_finished_on_device",
            Platform::Ios => "vdt_ios_addon_test_finished_on_device",
        }
    }
}

/// Upload URLs for test binaries were handed out.
pub const UPLOAD_REQUESTED_EVENT: &str = "vdt_android_addon_file_upload_requested";
/// Build-level pass/fail/empty verdict, sent when a build finishes.
pub const SUMMARY_GENERATED_EVENT: &str = "Test report summary generated";
pub const REPORT_COUNT_EVENT: &str = "Number of test reports";
pub const REPORT_RESULT_EVENT: &str = "Test report result";

/// Device a run was executed on, as reported in per-device events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProps {
    pub device_id: String,
    pub os_version: String,
    pub language: String,
    pub orientation: String,
}

impl From<&AndroidDevice> for DeviceProps {
    fn from(device: &AndroidDevice) -> Self {
        DeviceProps {
            device_id: device.android_model_id.clone(),
            os_version: device.android_version_id.clone(),
            language: device.locale.clone(),
            orientation: device.orientation.clone(),
        }
    }
}

impl From<&IosDevice> for DeviceProps {
    fn from(device: &IosDevice) -> Self {
        DeviceProps {
            device_id: device.ios_model_id.clone(),
            os_version: device.ios_version_id.clone(),
            language: device.locale.clone(),
            orientation: device.orientation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: String,
    /// User the event is attributed to (the app slug).
    pub user_id: String,
    pub properties: Map<String, Value>,
}

/// Destination of analytics events. Delivery is best effort.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Sink that writes events to the `analytics` log target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        info!(
            target: "analytics",
            event = %event.name,
            user_id = %event.user_id,
            properties = %serde_json::Value::Object(event.properties),
            "Tracked event"
        );
    }
}

fn base_properties(
    app_slug: &str,
    build_slug: &str,
    test_type: &str,
    extra: &[(&str, &str)],
) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("app_slug".to_string(), json!(app_slug));
    properties.insert("build_slug".to_string(), json!(build_slug));
    if !test_type.is_empty() {
        properties.insert("test_type".to_string(), json!(test_type));
    }
    for (key, value) in extra {
        properties.insert((*key).to_string(), json!(value));
    }
    properties
}

/// Send one run-level event.
pub fn send_run_event(
    sink: &dyn AnalyticsSink,
    event: &str,
    app_slug: &str,
    build_slug: &str,
    test_type: &str,
    extra: &[(&str, &str)],
) {
    sink.track(AnalyticsEvent {
        name: event.to_string(),
        user_id: app_slug.to_string(),
        properties: base_properties(app_slug, build_slug, test_type, extra),
    });
}

/// Send one build-level event with typed properties.
pub fn send_build_event(
    sink: &dyn AnalyticsSink,
    event: &str,
    app_slug: &str,
    build_slug: &str,
    extra: Vec<(&str, Value)>,
) {
    let mut properties = base_properties(app_slug, build_slug, "", &[]);
    properties.insert("datetime".to_string(), json!(Utc::now().to_rfc3339()));
    for (key, value) in extra {
        properties.insert(key.to_string(), value);
    }
    sink.track(AnalyticsEvent {
        name: event.to_string(),
        user_id: app_slug.to_string(),
        properties,
    });
}

/// Send one event per device.
pub fn send_device_events(
    sink: &dyn AnalyticsSink,
    event: &str,
    app_slug: &str,
    build_slug: &str,
    test_type: &str,
    devices: &[DeviceProps],
    extra: &[(&str, &str)],
) {
    for device in devices {
        let mut properties = base_properties(app_slug, build_slug, test_type, extra);
        properties.insert("device_id".to_string(), json!(device.device_id));
        properties.insert("device_os_version".to_string(), json!(device.os_version));
        properties.insert("device_language".to_string(), json!(device.language));
        properties.insert("device_orientation".to_string(), json!(device.orientation));

        sink.track(AnalyticsEvent {
            name: event.to_string(),
            user_id: app_slug.to_string(),
            properties,
        });
    }
}
