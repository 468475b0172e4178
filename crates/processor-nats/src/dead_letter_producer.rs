use async_nats::jetstream;
use async_trait::async_trait;
use processor_domain::{DeadLetterPublisher, DeadLetterRecord, DomainError, DomainResult};
use tracing::{info, warn};

/// Publishes quarantine records to the dead-letter queue
///
/// The quarantine subject is distinct from both the inbound and outbound
/// subjects; records land in the durable stream for operator triage and are
/// never retried automatically.
pub struct NatsDeadLetterPublisher {
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsDeadLetterPublisher {
    pub fn new(jetstream: jetstream::Context, subject: String) -> Self {
        info!(subject = %subject, "Created dead-letter publisher");
        Self { jetstream, subject }
    }
}

#[async_trait]
impl DeadLetterPublisher for NatsDeadLetterPublisher {
    async fn publish_dead_letter(&self, record: &DeadLetterRecord) -> DomainResult<()> {
        let payload = serde_json::to_vec(record).map_err(|e| {
            DomainError::PublishError(format!("failed to encode dead-letter record: {e}"))
        })?;

        warn!(
            subject = %self.subject,
            correlation_id = %record.correlation_id,
            error = %record.error,
            "Publishing dead-letter record"
        );

        let ack = self
            .jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| DomainError::PublishError(format!("dead-letter publish failed: {e}")))?;

        ack.await.map_err(|e| {
            DomainError::PublishError(format!("dead-letter publish not acknowledged: {e}"))
        })?;

        Ok(())
    }
}
