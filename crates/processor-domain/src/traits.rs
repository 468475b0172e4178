use async_trait::async_trait;

use crate::envelope::{DeadLetterRecord, EventEnvelope};
use crate::error::DomainResult;
use crate::job::{JobRecord, JobStatus};

/// Persistence gateway for job records
///
/// The sole writer of the `jobs` table. Create-or-update semantics keyed by
/// job id; which transitions are legal is decided by the state machine, not
/// here.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert the job on first sight or update status/payload/updated_at on
    /// conflict
    async fn upsert(&self, job: &JobRecord, status: JobStatus) -> DomainResult<()>;

    /// Set the final status of an existing job
    async fn finalize(&self, job_id: &str, status: JobStatus) -> DomainResult<()>;
}

/// Trait for publishing completion events to the outbound queue
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CompletionPublisher: Send + Sync {
    async fn publish_completion(&self, event: &EventEnvelope) -> DomainResult<()>;
}

/// Trait for publishing quarantine records to the dead-letter queue
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    async fn publish_dead_letter(&self, record: &DeadLetterRecord) -> DomainResult<()>;
}
