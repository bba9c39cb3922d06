//! Database queries for apps.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use secrecy::SecretString;

use crate::entity::app::{self, Entity as AppEntity};
use crate::error::{AppError, AppResult};
use crate::models::App;

use super::DbPool;

impl From<app::Model> for App {
    fn from(model: app::Model) -> Self {
        App {
            app_slug: model.app_slug,
            ci_api_token: SecretString::from(model.ci_api_token),
        }
    }
}

impl DbPool {
    /// Get an app by slug.
    pub async fn get_app(&self, app_slug: &str) -> AppResult<Option<App>> {
        let result = AppEntity::find()
            .filter(app::Column::AppSlug.eq(app_slug))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get app: {}", e)))?;

        Ok(result.map(App::from))
    }
}
