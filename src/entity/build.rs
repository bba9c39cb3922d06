//! Build entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "builds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub app_slug: String,
    pub build_slug: String,
    pub build_session_enabled: bool,
    pub test_matrix_id: String,
    pub test_history_id: String,
    pub test_execution_id: String,
    pub test_start_time: Option<DateTimeUtc>,
    pub test_end_time: Option<DateTimeUtc>,
    pub last_request: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
