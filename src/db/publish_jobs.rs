//! Database queries for the step result publish queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, Set, Statement,
};
use uuid::Uuid;

use crate::entity::publish_job::{self, ActiveModel, Entity as Job};
use crate::error::{AppError, AppResult};
use crate::services::publish_queue::{JobStatus, JobStore, PublishJob};

use super::DbPool;

const ENQUEUE_JOB: &str = r#"
    INSERT INTO publish_jobs (id, test_report_id, status, run_at)
    VALUES ($1, $2, 'pending', $3)
    ON CONFLICT (test_report_id) WHERE status = 'pending' DO NOTHING
"#;

const CLAIM_DUE_JOBS: &str = r#"
    UPDATE publish_jobs
    SET status = 'running', locked_until = $3, attempts = attempts + 1
    WHERE id IN (
        SELECT id FROM publish_jobs
        WHERE (status = 'pending' AND run_at <= $1)
           OR (status = 'running' AND locked_until <= $1)
        ORDER BY run_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    )
    RETURNING *
"#;

impl From<publish_job::Model> for PublishJob {
    fn from(model: publish_job::Model) -> Self {
        PublishJob {
            id: model.id,
            report_id: model.test_report_id,
            attempts: model.attempts.max(0) as u32,
        }
    }
}

impl DbPool {
    async fn get_job(&self, job_id: Uuid) -> AppResult<publish_job::Model> {
        Job::find_by_id(job_id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get publish job: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Publish job {}", job_id)))
    }

    /// Whether another job of the same report is waiting to run.
    async fn has_newer_pending(&self, job: &publish_job::Model) -> AppResult<bool> {
        let count = Job::find()
            .filter(publish_job::Column::TestReportId.eq(job.test_report_id))
            .filter(publish_job::Column::Status.eq(JobStatus::Pending.as_str()))
            .filter(publish_job::Column::Id.ne(job.id))
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to check pending jobs: {}", e)))?;
        Ok(count > 0)
    }
}

#[async_trait]
impl JobStore for DbPool {
    async fn enqueue(&self, report_id: Uuid, run_at: DateTime<Utc>) -> AppResult<bool> {
        let values: Vec<sea_orm::Value> =
            vec![Uuid::now_v7().into(), report_id.into(), run_at.into()];

        let result = self
            .connection()
            .execute_raw(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                ENQUEUE_JOB,
                values,
            ))
            .await
            .map_err(|e| AppError::Database(format!("Failed to enqueue publish job: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease_until: DateTime<Utc>,
    ) -> AppResult<Vec<PublishJob>> {
        let values: Vec<sea_orm::Value> = vec![now.into(), (limit as i64).into(), lease_until.into()];

        let claimed = publish_job::Model::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            CLAIM_DUE_JOBS,
            values,
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to claim publish jobs: {}", e)))?;

        Ok(claimed.into_iter().map(PublishJob::from).collect())
    }

    async fn complete(&self, job_id: Uuid) -> AppResult<()> {
        let mut active: ActiveModel = self.get_job(job_id).await?.into();
        active.status = Set(JobStatus::Done.as_str().to_string());
        active.locked_until = Set(None);
        active.last_error = Set(None);

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to complete publish job: {}", e)))?;

        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let job = self.get_job(job_id).await?;
        let superseded = retry_at.is_some() && self.has_newer_pending(&job).await?;

        let mut active: ActiveModel = job.into();
        active.locked_until = Set(None);
        active.last_error = Set(Some(error.to_string()));
        match retry_at {
            Some(_) if superseded => {
                active.status = Set(JobStatus::Failed.as_str().to_string());
            }
            Some(run_at) => {
                active.status = Set(JobStatus::Pending.as_str().to_string());
                active.run_at = Set(run_at);
            }
            None => active.status = Set(JobStatus::Failed.as_str().to_string()),
        }

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to record publish job failure: {}", e)))?;

        Ok(())
    }
}
