//! Device and locale lookup table.
//!
//! Built once at startup from the testing service's environment catalog and
//! shared read-only afterwards.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use super::testing_service::TestingService;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub supported_version_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogLocale {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfiguration {
    #[serde(default)]
    pub locales: Vec<CatalogLocale>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCatalogSection {
    #[serde(default)]
    pub models: Vec<CatalogModel>,
    #[serde(default)]
    pub runtime_configuration: Option<RuntimeConfiguration>,
}

/// Environment catalog document of the testing service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvironmentCatalog {
    #[serde(default)]
    pub android_device_catalog: Option<DeviceCatalogSection>,
    #[serde(default)]
    pub ios_device_catalog: Option<DeviceCatalogSection>,
}

/// Immutable device-name and locale lookup.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    device_names: HashMap<String, String>,
    locales: HashMap<String, String>,
    android_models: Vec<CatalogModel>,
}

impl DeviceCatalog {
    /// Empty catalog; every lookup passes the id through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the lookup from the Android and iOS catalogs.
    ///
    /// Android names win over iOS names when both define the same id.
    pub fn from_catalogs(android: &TestEnvironmentCatalog, ios: &TestEnvironmentCatalog) -> Self {
        let mut catalog = DeviceCatalog::default();

        if let Some(section) = &ios.ios_device_catalog {
            for model in &section.models {
                catalog
                    .device_names
                    .insert(model.id.clone(), model.name.clone());
            }
        }

        if let Some(section) = &android.android_device_catalog {
            for model in &section.models {
                catalog
                    .device_names
                    .insert(model.id.clone(), model.name.clone());
            }
            catalog.android_models = section.models.clone();

            if let Some(runtime) = &section.runtime_configuration {
                for locale in &runtime.locales {
                    let label = if locale.region.is_empty() {
                        locale.name.clone()
                    } else {
                        format!("{} ({})", locale.name, locale.region)
                    };
                    catalog.locales.insert(locale.id.clone(), label);
                }
            }
        }

        catalog
    }

    /// Readable device name, or the id itself when unknown.
    pub fn device_name(&self, id: &str) -> String {
        self.device_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Readable locale label, or the id itself when unknown.
    pub fn locale_name(&self, id: &str) -> String {
        self.locales
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.device_names.is_empty() && self.locales.is_empty()
    }

    fn virtual_device_ids(&self) -> Vec<&str> {
        self.android_models
            .iter()
            .filter(|m| m.form == "VIRTUAL")
            .map(|m| m.id.as_str())
            .collect()
    }

    /// Check that a requested Android device is a known virtual device
    /// supporting the requested version.
    ///
    /// Skipped when no Android catalog was loaded.
    pub fn validate_android_device(&self, model_id: &str, version_id: &str) -> Result<(), String> {
        if self.android_models.is_empty() {
            return Ok(());
        }

        let model = self
            .android_models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| {
                format!(
                    "device ({}) not found. Available devices: {:?}",
                    model_id,
                    self.virtual_device_ids()
                )
            })?;

        if model.form != "VIRTUAL" {
            return Err(format!(
                "({}) is not a virtual device. Available virtual devices: {:?}",
                model_id,
                self.virtual_device_ids()
            ));
        }

        if !model.supported_version_ids.iter().any(|v| v == version_id) {
            return Err(format!(
                "device ({}) has no version: {}. Available versions: {:?}",
                model_id, version_id, model.supported_version_ids
            ));
        }

        Ok(())
    }
}

/// Fetch the Android and iOS catalogs. Any failure yields an empty catalog,
/// which passes device and locale ids through unchanged.
pub async fn load_device_catalog(testing: &dyn TestingService) -> DeviceCatalog {
    let android = testing.environment_catalog("ANDROID").await;
    let ios = testing.environment_catalog("IOS").await;

    match (android, ios) {
        (Ok(android), Ok(ios)) => {
            let catalog = DeviceCatalog::from_catalogs(&android, &ios);
            info!(
                devices = catalog.device_names.len(),
                locales = catalog.locales.len(),
                "Device catalog loaded"
            );
            catalog
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Failed to load device catalog, using raw ids");
            DeviceCatalog::empty()
        }
    }
}
