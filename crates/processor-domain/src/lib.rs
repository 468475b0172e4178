mod contract;
mod envelope;
mod error;
mod job;
mod metrics;
mod pipeline;
mod traits;

pub use contract::{ContractValidator, ContractViolation, ENVELOPE_CONTRACT, JOB_CONTRACT};
pub use envelope::{correlation_id_of, DeadLetterRecord, EventEnvelope, Producer, ServiceIdentity};
pub use error::{DomainError, DomainResult};
pub use job::{EventOutcome, JobRecord, JobStateMachine, JobStatus};
pub use metrics::PipelineMetrics;
pub use pipeline::{DeliveryContext, Disposition, JobPipeline};
pub use traits::{CompletionPublisher, DeadLetterPublisher, JobRepository};

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use traits::MockCompletionPublisher;
#[cfg(any(test, feature = "testing"))]
pub use traits::MockDeadLetterPublisher;
#[cfg(any(test, feature = "testing"))]
pub use traits::MockJobRepository;
