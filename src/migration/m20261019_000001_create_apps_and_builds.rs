//! Migration: Create apps and builds tables and shared trigger function.
//!
//! Builds carry the test matrix bookkeeping of one CI build.

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
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TABLE apps (
                    id UUID PRIMARY KEY,
                    app_slug VARCHAR(255) NOT NULL UNIQUE,
                    ci_api_token TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE TABLE builds (
                    id UUID PRIMARY KEY,
                    app_slug VARCHAR(255) NOT NULL,
                    build_slug VARCHAR(255) NOT NULL,
                    build_session_enabled BOOLEAN NOT NULL DEFAULT FALSE,
                    test_matrix_id TEXT NOT NULL DEFAULT '',
                    test_history_id TEXT NOT NULL DEFAULT '',
                    test_execution_id TEXT NOT NULL DEFAULT '',
                    test_start_time TIMESTAMPTZ,
                    test_end_time TIMESTAMPTZ,
                    last_request TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CONSTRAINT uq_builds_app_build UNIQUE (app_slug, build_slug)
                );

                CREATE TRIGGER update_apps_updated_at
                    BEFORE UPDATE ON apps
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();

                CREATE TRIGGER update_builds_updated_at
                    BEFORE UPDATE ON builds
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
                DROP TRIGGER IF EXISTS update_builds_updated_at ON builds;
                DROP TRIGGER IF EXISTS update_apps_updated_at ON apps;
                DROP TABLE IF EXISTS builds CASCADE;
                DROP TABLE IF EXISTS apps CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
