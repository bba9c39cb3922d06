//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20261019_000001_create_apps_and_builds;
mod m20261019_000002_create_test_reports;
mod m20261019_000003_create_publish_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261019_000001_create_apps_and_builds::Migration),
            Box::new(m20261019_000002_create_test_reports::Migration),
            Box::new(m20261019_000003_create_publish_jobs::Migration),
        ]
    }
}
