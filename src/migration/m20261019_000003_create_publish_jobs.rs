//! Migration: Create publish_jobs table.
//!
//! At most one pending job exists per test report. A report acknowledged
//! again while its job runs gets a second, pending job.

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
                CREATE TABLE publish_jobs (
                    id UUID PRIMARY KEY,
                    test_report_id UUID NOT NULL REFERENCES test_reports(id) ON DELETE CASCADE,
                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'running', 'done', 'failed')),
                    run_at TIMESTAMPTZ NOT NULL,
                    locked_until TIMESTAMPTZ,
                    attempts INTEGER NOT NULL DEFAULT 0,
                    last_error TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE UNIQUE INDEX uq_publish_jobs_pending_report ON publish_jobs(test_report_id)
                    WHERE status = 'pending';

                CREATE INDEX idx_publish_jobs_due ON publish_jobs(run_at)
                    WHERE status = 'pending';

                CREATE INDEX idx_publish_jobs_lease ON publish_jobs(locked_until)
                    WHERE status = 'running';

                CREATE TRIGGER update_publish_jobs_updated_at
                    BEFORE UPDATE ON publish_jobs
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
                DROP TRIGGER IF EXISTS update_publish_jobs_updated_at ON publish_jobs;
                DROP TABLE IF EXISTS publish_jobs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
