use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DomainError, DomainResult};

/// Lifecycle status of a job
///
/// `Completed` and `Failed` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(DomainError::InvalidState(other.to_string())),
        }
    }
}

/// Domain entity for a single job, as embedded in `job.*` event payloads
///
/// `payload` is optional on the wire; an absent payload is an empty object,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of offering an event identifier to a state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    Duplicate,
}

/// In-memory lifecycle model for one job
///
/// Legal transitions: `PENDING→PROCESSING`, `PROCESSING→COMPLETED`,
/// `PROCESSING→FAILED`. Everything else is a logical no-op, so a
/// redelivered, already-terminal event is safe to replay. The machine also
/// de-duplicates event identifiers it has applied; duplicate detection is
/// scoped to this instance.
#[derive(Debug, Clone)]
pub struct JobStateMachine {
    status: JobStatus,
    seen_events: HashSet<String>,
}

impl JobStateMachine {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            seen_events: HashSet::new(),
        }
    }

    /// Construct from a raw status string, rejecting anything outside the
    /// four legal states
    pub fn from_status(status: &str) -> DomainResult<Self> {
        Ok(Self::new(status.parse()?))
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Attempt a transition, returning whether it was applied
    ///
    /// An illegal source state leaves the status unchanged and returns
    /// false rather than erroring.
    pub fn transition(&mut self, target: JobStatus) -> bool {
        let legal = matches!(
            (self.status, target),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        );

        if legal {
            debug!(from = %self.status, to = %target, "applying job transition");
            self.status = target;
        } else {
            debug!(from = %self.status, to = %target, "rejecting illegal job transition");
        }

        legal
    }

    /// Offer an event identifier, de-duplicating repeats
    ///
    /// The transport redelivered flag is logged for observability only and
    /// never affects the decision.
    pub fn process_event(&mut self, event_id: &str, redelivered: bool) -> EventOutcome {
        if self.seen_events.contains(event_id) {
            debug!(event_id = %event_id, redelivered, "duplicate event identifier, skipping");
            return EventOutcome::Duplicate;
        }

        self.seen_events.insert(event_id.to_string());
        debug!(event_id = %event_id, redelivered, "first sight of event identifier");
        EventOutcome::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use serde_json::json;

    #[test]
    fn test_legal_transitions_apply() {
        let cases = [
            (JobStatus::Pending, JobStatus::Processing),
            (JobStatus::Processing, JobStatus::Completed),
            (JobStatus::Processing, JobStatus::Failed),
        ];

        for (from, to) in cases {
            let mut machine = JobStateMachine::new(from);
            assert!(machine.transition(to), "{from} -> {to} should apply");
            assert_eq!(machine.status(), to);
        }
    }

    #[test]
    fn test_illegal_transitions_leave_status_unchanged() {
        let all = [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ];
        let legal = [
            (JobStatus::Pending, JobStatus::Processing),
            (JobStatus::Processing, JobStatus::Completed),
            (JobStatus::Processing, JobStatus::Failed),
        ];

        for from in all {
            for to in all {
                if legal.contains(&(from, to)) {
                    continue;
                }
                let mut machine = JobStateMachine::new(from);
                assert!(!machine.transition(to), "{from} -> {to} should be rejected");
                assert_eq!(machine.status(), from);
            }
        }
    }

    #[test]
    fn test_terminal_states_reject_further_transitions() {
        let mut completed = JobStateMachine::new(JobStatus::Completed);
        assert!(!completed.transition(JobStatus::Processing));
        assert_eq!(completed.status(), JobStatus::Completed);

        let mut pending = JobStateMachine::new(JobStatus::Pending);
        assert!(!pending.transition(JobStatus::Completed));
        assert_eq!(pending.status(), JobStatus::Pending);
    }

    #[test]
    fn test_invalid_initial_status_is_rejected() {
        let result = JobStateMachine::from_status("RUNNING");
        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_duplicate_event_detection_ignores_delivery_metadata() {
        let mut machine = JobStateMachine::new(JobStatus::Pending);

        assert_eq!(machine.process_event("evt-1", false), EventOutcome::Processed);
        // same identifier, different transport metadata: still a duplicate
        assert_eq!(machine.process_event("evt-1", true), EventOutcome::Duplicate);

        assert_eq!(machine.process_event("evt-2", true), EventOutcome::Processed);
        // both identifiers are retained in the de-dup set
        assert_eq!(machine.process_event("evt-2", false), EventOutcome::Duplicate);
        assert_eq!(machine.process_event("evt-1", false), EventOutcome::Duplicate);
    }

    #[test]
    fn test_missing_payload_deserializes_to_empty_object() {
        let record: JobRecord = serde_json::from_value(json!({
            "id": "job-1",
            "type": "encode",
            "status": "PENDING",
            "createdAt": "2026-08-26T12:00:00Z"
        }))
        .unwrap();

        assert!(record.payload.is_empty());
        let serialized = serde_json::to_value(&record).unwrap();
        assert_eq!(serialized["payload"], json!({}));
    }

    #[test]
    fn test_status_round_trips_as_uppercase() {
        let record: JobRecord = serde_json::from_value(json!({
            "id": "job-1",
            "type": "encode",
            "status": "PROCESSING",
            "createdAt": "2026-08-26T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(serde_json::to_value(record.status).unwrap(), json!("PROCESSING"));
    }
}
