use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use processor_domain::{DomainResult, JobRecord, JobRepository, JobStatus};
use tracing::debug;

use crate::client::PostgresClient;

/// Job persistence gateway backed by PostgreSQL
///
/// The sole writer of the `jobs` table. Rows are keyed by the
/// producer-assigned job id; the first sight of a job inserts it and every
/// later write updates status, payload and the updated timestamp.
#[derive(Clone)]
pub struct PostgresJobRepository {
    client: PostgresClient,
}

impl PostgresJobRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn upsert(&self, job: &JobRecord, status: JobStatus) -> DomainResult<()> {
        let conn = self.client.get_connection().await?;
        let now = Utc::now();
        let payload = serde_json::Value::Object(job.payload.clone());

        conn.execute(
            "INSERT INTO jobs (id, type, status, payload, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET status = EXCLUDED.status,
                 payload = EXCLUDED.payload,
                 updated_at = EXCLUDED.updated_at",
            &[
                &job.id,
                &job.job_type,
                &status.as_str(),
                &payload,
                &job.created_at,
                &now,
            ],
        )
        .await
        .context("Failed to upsert job")?;

        debug!(job_id = %job.id, status = %status, "Upserted job");
        Ok(())
    }

    async fn finalize(&self, job_id: &str, status: JobStatus) -> DomainResult<()> {
        let conn = self.client.get_connection().await?;
        let now = Utc::now();

        let rows_affected = conn
            .execute(
                "UPDATE jobs SET status = $1, updated_at = $2 WHERE id = $3",
                &[&status.as_str(), &now, &job_id],
            )
            .await
            .context("Failed to finalize job")?;

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Job not found: {}", job_id).into());
        }

        debug!(job_id = %job_id, status = %status, "Finalized job");
        Ok(())
    }
}
