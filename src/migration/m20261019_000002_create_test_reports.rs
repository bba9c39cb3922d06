//! Migration: Create test_reports and test_report_assets tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE test_reports (
                    id UUID PRIMARY KEY,
                    name TEXT NOT NULL DEFAULT '',
                    filename TEXT NOT NULL,
                    filesize BIGINT NOT NULL CHECK (filesize > 0),

                    -- CI step metadata {id, version, title, number}
                    step JSONB NOT NULL DEFAULT '{}',

                    uploaded BOOLEAN NOT NULL DEFAULT FALSE,
                    app_slug VARCHAR(255) NOT NULL,
                    build_slug VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_reports_build ON test_reports(app_slug, build_slug, created_at)
                    WHERE uploaded;

                CREATE TABLE test_report_assets (
                    id UUID PRIMARY KEY,
                    test_report_id UUID NOT NULL REFERENCES test_reports(id) ON DELETE CASCADE,
                    filename TEXT NOT NULL,
                    filesize BIGINT NOT NULL CHECK (filesize > 0),
                    uploaded BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_report_assets_report ON test_report_assets(test_report_id);

                CREATE TRIGGER update_test_reports_updated_at
                    BEFORE UPDATE ON test_reports
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();

                CREATE TRIGGER update_test_report_assets_updated_at
                    BEFORE UPDATE ON test_report_assets
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_test_report_assets_updated_at ON test_report_assets;
                DROP TRIGGER IF EXISTS update_test_reports_updated_at ON test_reports;
                DROP TABLE IF EXISTS test_report_assets CASCADE;
                DROP TABLE IF EXISTS test_reports CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
