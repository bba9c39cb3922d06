//! In-process store backing tests and database-less runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{App, Build, NewTestReport, TestReport, TestReportAsset, TestReportPatch};

use super::store::{BuildStore, ReportStore};

#[derive(Default)]
struct State {
    apps: HashMap<String, App>,
    builds: HashMap<(String, String), Build>,
    reports: Vec<TestReport>,
}

/// Store keeping every record in memory. Locks are never held across awaits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    pub fn insert_app(&self, app: App) -> AppResult<()> {
        self.lock()?.apps.insert(app.app_slug.clone(), app);
        Ok(())
    }

    /// Insert a report as-is, keeping its id and assets.
    pub fn insert_report(&self, report: TestReport) -> AppResult<()> {
        self.lock()?.reports.push(report);
        Ok(())
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn find_app(&self, app_slug: &str) -> AppResult<Option<App>> {
        Ok(self.lock()?.apps.get(app_slug).cloned())
    }

    async fn find_build(&self, app_slug: &str, build_slug: &str) -> AppResult<Option<Build>> {
        let key = (app_slug.to_string(), build_slug.to_string());
        Ok(self.lock()?.builds.get(&key).cloned())
    }

    async fn save_build(&self, build: &Build) -> AppResult<Build> {
        let key = (build.app_slug.clone(), build.build_slug.clone());
        self.lock()?.builds.insert(key, build.clone());
        Ok(build.clone())
    }

    async fn list_expired_open_builds(&self, before: DateTime<Utc>) -> AppResult<Vec<Build>> {
        Ok(self
            .lock()?
            .builds
            .values()
            .filter(|b| b.build_session_enabled && b.last_request.is_some_and(|at| at <= before))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn create_report(
        &self,
        app_slug: &str,
        build_slug: &str,
        report: &NewTestReport,
    ) -> AppResult<TestReport> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let created = TestReport {
            id,
            name: report.name.clone(),
            filename: report.filename.clone(),
            filesize: report.filesize,
            step: serde_json::to_value(&report.step)?,
            uploaded: false,
            app_slug: app_slug.to_string(),
            build_slug: build_slug.to_string(),
            created_at: now,
            assets: report
                .assets
                .iter()
                .map(|asset| TestReportAsset {
                    id: Uuid::now_v7(),
                    test_report_id: id,
                    filename: asset.filename.clone(),
                    filesize: asset.filesize,
                    uploaded: false,
                    created_at: now,
                })
                .collect(),
        };

        self.lock()?.reports.push(created.clone());
        Ok(created)
    }

    async fn get_report(&self, id: Uuid) -> AppResult<Option<TestReport>> {
        Ok(self.lock()?.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn list_uploaded_reports(
        &self,
        app_slug: &str,
        build_slug: &str,
    ) -> AppResult<Vec<TestReport>> {
        Ok(self
            .lock()?
            .reports
            .iter()
            .filter(|r| r.uploaded && r.app_slug == app_slug && r.build_slug == build_slug)
            .cloned()
            .collect())
    }

    async fn update_report(&self, id: Uuid, patch: &TestReportPatch) -> AppResult<TestReport> {
        let mut state = self.lock()?;
        let report = state
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Test report {}", id)))?;

        if let Some(name) = patch.name.as_deref().filter(|n| !n.is_empty()) {
            report.name = name.to_string();
        }
        if let Some(uploaded) = patch.uploaded {
            report.uploaded = uploaded;
        }
        Ok(report.clone())
    }
}
