use async_nats::jetstream;
use async_trait::async_trait;
use processor_domain::{CompletionPublisher, DomainError, DomainResult, EventEnvelope};
use tracing::{debug, info};

/// Publishes completion events to the outbound queue as JSON
pub struct NatsCompletionPublisher {
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsCompletionPublisher {
    pub fn new(jetstream: jetstream::Context, subject: String) -> Self {
        info!(subject = %subject, "Created completion publisher");
        Self { jetstream, subject }
    }
}

#[async_trait]
impl CompletionPublisher for NatsCompletionPublisher {
    async fn publish_completion(&self, event: &EventEnvelope) -> DomainResult<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| DomainError::PublishError(format!("failed to encode completion: {e}")))?;

        debug!(
            subject = %self.subject,
            event_id = %event.event_id,
            correlation_id = %event.correlation_id,
            size_bytes = payload.len(),
            "Publishing completion event"
        );

        // Await the JetStream acknowledgment so the event is durable before
        // the inbound delivery is resolved
        let ack = self
            .jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| DomainError::PublishError(format!("completion publish failed: {e}")))?;

        ack.await.map_err(|e| {
            DomainError::PublishError(format!("completion publish not acknowledged: {e}"))
        })?;

        debug!(
            subject = %self.subject,
            event_id = %event.event_id,
            "Completion event published and acknowledged"
        );

        Ok(())
    }
}
