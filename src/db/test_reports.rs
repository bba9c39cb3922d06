//! Database queries for test reports and their assets.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::test_report::{self as report, ActiveModel, Entity as Report};
use crate::entity::test_report_asset::{self as asset, Entity as Asset};
use crate::error::{AppError, AppResult};
use crate::models::{NewTestReport, TestReport, TestReportAsset, TestReportPatch};

use super::DbPool;
use super::store::ReportStore;

impl From<asset::Model> for TestReportAsset {
    fn from(model: asset::Model) -> Self {
        TestReportAsset {
            id: model.id,
            test_report_id: model.test_report_id,
            filename: model.filename,
            filesize: model.filesize,
            uploaded: model.uploaded,
            created_at: model.created_at,
        }
    }
}

fn to_report(model: report::Model, assets: Vec<TestReportAsset>) -> TestReport {
    TestReport {
        id: model.id,
        name: model.name,
        filename: model.filename,
        filesize: model.filesize,
        step: model.step,
        uploaded: model.uploaded,
        app_slug: model.app_slug,
        build_slug: model.build_slug,
        created_at: model.created_at,
        assets,
    }
}

impl DbPool {
    /// Assets of the given reports, grouped by report id.
    async fn get_assets_for_reports(
        &self,
        report_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<TestReportAsset>>> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Asset::find()
            .filter(asset::Column::TestReportId.is_in(report_ids.to_vec()))
            .order_by_asc(asset::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test report assets: {}", e)))?;

        let mut grouped: HashMap<Uuid, Vec<TestReportAsset>> = HashMap::new();
        for row in rows {
            grouped.entry(row.test_report_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl ReportStore for DbPool {
    async fn create_report(
        &self,
        app_slug: &str,
        build_slug: &str,
        new_report: &NewTestReport,
    ) -> AppResult<TestReport> {
        let now = Utc::now();
        let id = Uuid::now_v7();

        let model = ActiveModel {
            id: Set(id),
            name: Set(new_report.name.clone()),
            filename: Set(new_report.filename.clone()),
            filesize: Set(new_report.filesize),
            step: Set(serde_json::to_value(&new_report.step)?),
            uploaded: Set(false),
            app_slug: Set(app_slug.to_string()),
            build_slug: Set(build_slug.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert test report: {}", e)))?;

        let mut assets = Vec::with_capacity(new_report.assets.len());
        for new_asset in &new_report.assets {
            let model = asset::ActiveModel {
                id: Set(Uuid::now_v7()),
                test_report_id: Set(id),
                filename: Set(new_asset.filename.clone()),
                filesize: Set(new_asset.filesize),
                uploaded: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            };

            let inserted = model.insert(self.connection()).await.map_err(|e| {
                AppError::Database(format!("Failed to insert test report asset: {}", e))
            })?;
            assets.push(inserted.into());
        }

        Ok(to_report(created, assets))
    }

    async fn get_report(&self, id: Uuid) -> AppResult<Option<TestReport>> {
        let Some(model) = Report::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test report: {}", e)))?
        else {
            return Ok(None);
        };

        let assets = self
            .get_assets_for_reports(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(Some(to_report(model, assets)))
    }

    async fn list_uploaded_reports(
        &self,
        app_slug: &str,
        build_slug: &str,
    ) -> AppResult<Vec<TestReport>> {
        let models = Report::find()
            .filter(report::Column::AppSlug.eq(app_slug))
            .filter(report::Column::BuildSlug.eq(build_slug))
            .filter(report::Column::Uploaded.eq(true))
            .order_by_asc(report::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list test reports: {}", e)))?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut assets = self.get_assets_for_reports(&ids).await?;

        Ok(models
            .into_iter()
            .map(|m| {
                let report_assets = assets.remove(&m.id).unwrap_or_default();
                to_report(m, report_assets)
            })
            .collect())
    }

    async fn update_report(&self, id: Uuid, patch: &TestReportPatch) -> AppResult<TestReport> {
        let existing = Report::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get test report: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Test report {}", id)))?;

        let mut active: ActiveModel = existing.into();
        if let Some(name) = patch.name.as_deref().filter(|n| !n.is_empty()) {
            active.name = Set(name.to_string());
        }
        if let Some(uploaded) = patch.uploaded {
            active.uploaded = Set(uploaded);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update test report: {}", e)))?;

        let assets = self
            .get_assets_for_reports(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(to_report(updated, assets))
    }
}
