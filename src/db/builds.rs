//! Database queries for builds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, QueryFilter, Statement,
};
use uuid::Uuid;

use crate::entity::build::{self, Entity as BuildEntity};
use crate::error::{AppError, AppResult};
use crate::models::{App, Build};

use super::DbPool;
use super::store::BuildStore;

impl From<build::Model> for Build {
    fn from(model: build::Model) -> Self {
        Build {
            app_slug: model.app_slug,
            build_slug: model.build_slug,
            build_session_enabled: model.build_session_enabled,
            test_matrix_id: model.test_matrix_id,
            test_history_id: model.test_history_id,
            test_execution_id: model.test_execution_id,
            test_start_time: model.test_start_time,
            test_end_time: model.test_end_time,
            last_request: model.last_request,
        }
    }
}

const UPSERT_BUILD: &str = r#"
    INSERT INTO builds (
        id, app_slug, build_slug, build_session_enabled, test_matrix_id,
        test_history_id, test_execution_id, test_start_time, test_end_time, last_request
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (app_slug, build_slug) DO UPDATE SET
        build_session_enabled = EXCLUDED.build_session_enabled,
        test_matrix_id = EXCLUDED.test_matrix_id,
        test_history_id = EXCLUDED.test_history_id,
        test_execution_id = EXCLUDED.test_execution_id,
        test_start_time = EXCLUDED.test_start_time,
        test_end_time = EXCLUDED.test_end_time,
        last_request = EXCLUDED.last_request
    RETURNING *
"#;

#[async_trait]
impl BuildStore for DbPool {
    async fn find_app(&self, app_slug: &str) -> AppResult<Option<App>> {
        self.get_app(app_slug).await
    }

    async fn find_build(&self, app_slug: &str, build_slug: &str) -> AppResult<Option<Build>> {
        let result = BuildEntity::find()
            .filter(build::Column::AppSlug.eq(app_slug))
            .filter(build::Column::BuildSlug.eq(build_slug))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get build: {}", e)))?;

        Ok(result.map(Build::from))
    }

    async fn save_build(&self, b: &Build) -> AppResult<Build> {
        let values: Vec<sea_orm::Value> = vec![
            Uuid::now_v7().into(),
            b.app_slug.clone().into(),
            b.build_slug.clone().into(),
            b.build_session_enabled.into(),
            b.test_matrix_id.clone().into(),
            b.test_history_id.clone().into(),
            b.test_execution_id.clone().into(),
            b.test_start_time.into(),
            b.test_end_time.into(),
            b.last_request.into(),
        ];

        let saved = build::Model::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            UPSERT_BUILD,
            values,
        ))
        .one(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to save build: {}", e)))?
        .ok_or_else(|| AppError::Database("Build upsert returned no row".to_string()))?;

        Ok(saved.into())
    }

    async fn list_expired_open_builds(&self, before: DateTime<Utc>) -> AppResult<Vec<Build>> {
        let builds = BuildEntity::find()
            .filter(build::Column::BuildSessionEnabled.eq(true))
            .filter(build::Column::LastRequest.lte(before))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list expired builds: {}", e)))?;

        Ok(builds.into_iter().map(Build::from).collect())
    }
}
