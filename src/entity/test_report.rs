//! Test report entity for SeaORM.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "test_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub filesize: i64,
    #[sea_orm(column_type = "JsonBinary")]
    pub step: JsonValue,
    pub uploaded: bool,
    pub app_slug: String,
    pub build_slug: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_report_asset::Entity")]
    Assets,
    #[sea_orm(has_many = "super::publish_job::Entity")]
    PublishJobs,
}

impl Related<super::test_report_asset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl Related<super::publish_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PublishJobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
