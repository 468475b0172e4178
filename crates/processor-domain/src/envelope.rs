use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the producing service, carried inside every envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub service: String,
    pub instance: String,
    pub version: String,
}

/// Transport envelope wrapping a domain payload with contract metadata
///
/// The wire format is JSON with camelCase field names. `payload` stays an
/// opaque `serde_json::Value`; its shape is enforced by the contract
/// validator, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub contract_version: String,
    pub event_type: String,
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub correlation_id: String,
    pub idempotency_key: String,
    pub producer: Producer,
    pub payload: serde_json::Value,
}

/// Name and version this service stamps on derived events and quarantine
/// records
#[derive(Debug, Clone)]
pub struct ServiceIdentity {
    pub service: String,
    pub instance: String,
    pub version: String,
}

impl EventEnvelope {
    /// Derive the `job.completed` event from this envelope
    ///
    /// Shallow copy with a fresh v4 event id, `occurredAt` set to now and
    /// `producer.service` rewritten to this service. `correlationId` and
    /// `idempotencyKey` identify the causal chain and are carried through
    /// unchanged.
    pub fn to_completion(&self, identity: &ServiceIdentity) -> EventEnvelope {
        let mut completion = self.clone();
        completion.event_type = "job.completed".to_string();
        completion.event_id = uuid::Uuid::new_v4().to_string();
        completion.occurred_at = Utc::now();
        completion.producer.service = identity.service.clone();
        completion
    }
}

/// Best-effort correlation id extraction from a raw JSON message
///
/// Must never fail, even on a malformed or partial envelope. Returns the
/// literal `unknown` when the field cannot be read.
pub fn correlation_id_of(event: &serde_json::Value) -> String {
    event
        .get("correlationId")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Quarantine artifact for a message that can never succeed as-is
///
/// Holds the original event (JSON null when the body was unparseable), the
/// validation diagnostic and enough identity to triage manually. Never
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub original_event: serde_json::Value,
    pub error: String,
    pub rejected_at: DateTime<Utc>,
    pub correlation_id: String,
    pub service: String,
    pub service_version: String,
}

impl DeadLetterRecord {
    pub fn new(
        original_event: serde_json::Value,
        error: String,
        identity: &ServiceIdentity,
    ) -> Self {
        let correlation_id = correlation_id_of(&original_event);
        Self {
            original_event,
            error,
            rejected_at: Utc::now(),
            correlation_id,
            service: identity.service.clone(),
            service_version: identity.version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ServiceIdentity {
        ServiceIdentity {
            service: "processor".to_string(),
            instance: "test-1".to_string(),
            version: "0.1.0".to_string(),
        }
    }

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            contract_version: "1.0.0".to_string(),
            event_type: "job.created".to_string(),
            event_id: "evt-1".to_string(),
            occurred_at: Utc::now(),
            correlation_id: "corr-1".to_string(),
            idempotency_key: "idem-1".to_string(),
            producer: Producer {
                service: "api".to_string(),
                instance: "api-1".to_string(),
                version: "2.3.4".to_string(),
            },
            payload: json!({"id": "job-1"}),
        }
    }

    #[test]
    fn test_completion_rewrites_type_id_and_producer_service() {
        let original = envelope();
        let completion = original.to_completion(&identity());

        assert_eq!(completion.event_type, "job.completed");
        assert_ne!(completion.event_id, original.event_id);
        assert_eq!(completion.producer.service, "processor");
        // causal chain identifiers are untouched
        assert_eq!(completion.correlation_id, original.correlation_id);
        assert_eq!(completion.idempotency_key, original.idempotency_key);
        assert_eq!(completion.payload, original.payload);
    }

    #[test]
    fn test_envelope_wire_format_is_camel_case() {
        let value = serde_json::to_value(envelope()).unwrap();
        assert!(value.get("contractVersion").is_some());
        assert!(value.get("eventType").is_some());
        assert!(value.get("idempotencyKey").is_some());
        assert!(value["producer"].get("service").is_some());
    }

    #[test]
    fn test_correlation_id_of_well_formed_event() {
        let event = json!({"correlationId": "corr-9"});
        assert_eq!(correlation_id_of(&event), "corr-9");
    }

    #[test]
    fn test_correlation_id_of_never_fails() {
        assert_eq!(correlation_id_of(&json!({})), "unknown");
        assert_eq!(correlation_id_of(&json!(null)), "unknown");
        assert_eq!(correlation_id_of(&json!({"correlationId": 42})), "unknown");
        assert_eq!(correlation_id_of(&json!([1, 2, 3])), "unknown");
    }

    #[test]
    fn test_dead_letter_record_for_unparseable_message() {
        let record = DeadLetterRecord::new(
            serde_json::Value::Null,
            "invalid JSON".to_string(),
            &identity(),
        );
        assert_eq!(record.correlation_id, "unknown");
        assert_eq!(record.service, "processor");
        assert_eq!(record.service_version, "0.1.0");
    }
}
