use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::contract::ContractValidator;
use crate::envelope::{DeadLetterRecord, EventEnvelope, ServiceIdentity};
use crate::job::{JobRecord, JobStateMachine, JobStatus};
use crate::metrics::PipelineMetrics;
use crate::traits::{CompletionPublisher, DeadLetterPublisher, JobRepository};

/// How a delivery must be resolved against the queue
///
/// Exactly one disposition is produced per inbound delivery; the transport
/// adapter translates it into ack, terminal rejection or rejection with
/// redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Positive acknowledgment: processing finished
    Ack,
    /// The message can never succeed as-is; drop it without redelivery
    RejectPermanent { reason: String },
    /// Infrastructure failure; request redelivery for another attempt
    RejectTransient { reason: String },
}

/// Transport-level delivery metadata, logged for observability only
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryContext {
    pub redelivered: bool,
    pub delivery_count: i64,
}

/// Orchestrates the processing of one inbound message
///
/// Flow per message: parse → validate → (quarantine on contract violation)
/// → state-transition → persist PROCESSING → unit of work → persist
/// COMPLETED → publish completion. Permanent and transient failures are
/// separated by the returned [`Disposition`]; nothing here touches the
/// queue connection directly, so the whole flow is testable without one.
pub struct JobPipeline {
    validator: ContractValidator,
    repository: Arc<dyn JobRepository>,
    completions: Arc<dyn CompletionPublisher>,
    dead_letters: Arc<dyn DeadLetterPublisher>,
    metrics: Arc<PipelineMetrics>,
    identity: ServiceIdentity,
    work_delay: Duration,
}

impl JobPipeline {
    pub fn new(
        validator: ContractValidator,
        repository: Arc<dyn JobRepository>,
        completions: Arc<dyn CompletionPublisher>,
        dead_letters: Arc<dyn DeadLetterPublisher>,
        metrics: Arc<PipelineMetrics>,
        identity: ServiceIdentity,
        work_delay: Duration,
    ) -> Self {
        Self {
            validator,
            repository,
            completions,
            dead_letters,
            metrics,
            identity,
            work_delay,
        }
    }

    /// Process one raw message body to a single disposition
    pub async fn handle_message(&self, body: &[u8], delivery: DeliveryContext) -> Disposition {
        self.metrics.inc_processed();
        let started = Instant::now();

        // 1. Parse. No correlation id is available on failure; the message
        // is unrecoverable and there is nothing structured to quarantine.
        let raw: serde_json::Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.inc_validation_failures();
                warn!(error = %e, "discarding unparseable message body");
                return Disposition::RejectPermanent {
                    reason: format!("unparseable message body: {e}"),
                };
            }
        };

        // 2. Contract validation; violations are permanent and quarantined.
        if let Err(violation) = self.validator.validate_message(&raw) {
            return self.quarantine(raw, violation.diagnostic).await;
        }

        // The contract guarantees the envelope shape, but the typed decode
        // can still reject values the schema is loose about (e.g. a
        // non-RFC3339 timestamp). Treat that as the same permanent class.
        let envelope: EventEnvelope = match serde_json::from_value(raw.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                return self
                    .quarantine(raw, format!("envelope decode failed: {e}"))
                    .await;
            }
        };

        // 3. Extract the job; a missing payload sub-field is an empty
        // object per the job contract, never an error.
        let job: JobRecord = match serde_json::from_value(envelope.payload.clone()) {
            Ok(job) => job,
            Err(e) => {
                return self
                    .quarantine(raw, format!("job decode failed: {e}"))
                    .await;
            }
        };

        debug!(
            job_id = %job.id,
            event_id = %envelope.event_id,
            correlation_id = %envelope.correlation_id,
            redelivered = delivery.redelivered,
            delivery_count = delivery.delivery_count,
            "processing job event"
        );

        // No machine state crosses message boundaries; redelivery safety
        // rests on the transition check below and the idempotent upsert.
        let mut machine = JobStateMachine::new(job.status);

        // A redelivered event for an already-terminal job is a safe no-op:
        // acknowledge without writes and without a second completion event.
        if !machine.transition(JobStatus::Processing) {
            info!(
                job_id = %job.id,
                status = %job.status,
                correlation_id = %envelope.correlation_id,
                "job not in a startable state, acknowledging as no-op"
            );
            return Disposition::Ack;
        }

        // 4. Two ordered durable writes around the unit of work; any
        // failure here is transient and retried via redelivery.
        if let Err(e) = self.repository.upsert(&job, JobStatus::Processing).await {
            return self.transient(&envelope, "initial status write failed", e);
        }

        tokio::time::sleep(self.work_delay).await;

        machine.transition(JobStatus::Completed);
        if let Err(e) = self.repository.finalize(&job.id, JobStatus::Completed).await {
            return self.transient(&envelope, "completion status write failed", e);
        }

        // 5. The completion event must reach the publish call before the
        // positive acknowledgment, or a crash in between loses the signal.
        let completion = envelope.to_completion(&self.identity);
        if let Err(e) = self.completions.publish_completion(&completion).await {
            return self.transient(&envelope, "completion publish failed", e);
        }

        self.metrics.inc_completed();
        self.metrics
            .observe_processing_seconds(started.elapsed().as_secs_f64());
        info!(
            job_id = %job.id,
            correlation_id = %envelope.correlation_id,
            completion_event_id = %completion.event_id,
            "job completed"
        );
        Disposition::Ack
    }

    /// Publish a quarantine record and reject the message permanently
    ///
    /// If the dead-letter publish itself fails the rejection becomes
    /// transient instead, so the quarantine record is not lost: redelivery
    /// will re-run validation and retry the publish.
    async fn quarantine(&self, original: serde_json::Value, diagnostic: String) -> Disposition {
        let record = DeadLetterRecord::new(original, diagnostic.clone(), &self.identity);
        warn!(
            correlation_id = %record.correlation_id,
            diagnostic = %diagnostic,
            "message failed contract validation, routing to dead-letter queue"
        );

        if let Err(e) = self.dead_letters.publish_dead_letter(&record).await {
            self.metrics.inc_processing_failures();
            error!(
                error = %e,
                correlation_id = %record.correlation_id,
                "failed to publish dead-letter record, requesting redelivery"
            );
            return Disposition::RejectTransient {
                reason: format!("dead-letter publish failed: {e}"),
            };
        }

        self.metrics.inc_validation_failures();
        Disposition::RejectPermanent { reason: diagnostic }
    }

    fn transient(
        &self,
        envelope: &EventEnvelope,
        stage: &str,
        e: crate::error::DomainError,
    ) -> Disposition {
        self.metrics.inc_processing_failures();
        error!(
            error = %e,
            correlation_id = %envelope.correlation_id,
            "{stage}, requesting redelivery"
        );
        Disposition::RejectTransient {
            reason: format!("{stage}: {e}"),
        }
    }
}
