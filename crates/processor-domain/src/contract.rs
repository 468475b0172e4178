use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use jsonschema::Validator;
use tracing::debug;

use crate::error::{DomainError, DomainResult};

/// Contract name for the universal envelope schema
pub const ENVELOPE_CONTRACT: &str = "event-envelope";
/// Contract name for the job payload schema
pub const JOB_CONTRACT: &str = "job";

/// Maximum number of structural violations rendered into one diagnostic,
/// keeping quarantine records bounded in size
const MAX_VIOLATIONS: usize = 3;

/// A message failed structural validation against a published contract
#[derive(Debug, Clone)]
pub struct ContractViolation {
    pub diagnostic: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic)
    }
}

impl std::error::Error for ContractViolation {}

/// Validates event envelopes and job payloads against versioned contracts
///
/// Schemas are immutable for the process lifetime: each contract document is
/// loaded and compiled exactly once at construction and the compiled
/// validators are cached by contract name. A missing contract file is a
/// startup configuration error, never a per-message failure. Validation has
/// no side effects and never mutates its input.
pub struct ContractValidator {
    validators: HashMap<&'static str, Validator>,
}

impl ContractValidator {
    /// Load and compile the envelope and job contracts from a schemas
    /// directory containing `event-envelope.json` and `job.json`
    pub fn load(schemas_dir: &Path) -> DomainResult<Self> {
        let envelope = Self::read_schema(schemas_dir, ENVELOPE_CONTRACT)?;
        let job = Self::read_schema(schemas_dir, JOB_CONTRACT)?;
        Self::from_schemas(&envelope, &job)
    }

    /// Compile the contracts from in-memory schema documents
    pub fn from_schemas(envelope_schema: &str, job_schema: &str) -> DomainResult<Self> {
        let mut validators = HashMap::new();
        validators.insert(ENVELOPE_CONTRACT, Self::compile(ENVELOPE_CONTRACT, envelope_schema)?);
        validators.insert(JOB_CONTRACT, Self::compile(JOB_CONTRACT, job_schema)?);
        Ok(Self { validators })
    }

    fn read_schema(schemas_dir: &Path, name: &str) -> DomainResult<String> {
        let path = schemas_dir.join(format!("{name}.json"));
        std::fs::read_to_string(&path).map_err(|e| {
            DomainError::Configuration(format!("contract not found: {}: {e}", path.display()))
        })
    }

    fn compile(name: &str, schema_str: &str) -> DomainResult<Validator> {
        let schema_value: serde_json::Value = serde_json::from_str(schema_str)
            .map_err(|e| DomainError::Configuration(format!("contract {name} is not JSON: {e}")))?;

        let validator = Validator::new(&schema_value).map_err(|e| {
            DomainError::Configuration(format!("contract {name} is not a valid JSON Schema: {e}"))
        })?;

        debug!(contract = name, "compiled contract validator");
        Ok(validator)
    }

    fn check(&self, contract: &'static str, data: &serde_json::Value) -> Result<(), String> {
        // validators map is populated for both contract names at construction
        let validator = &self.validators[contract];

        let violations: Vec<String> = validator
            .iter_errors(data)
            .take(MAX_VIOLATIONS)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }

    /// Validate an envelope against the universal envelope contract
    pub fn validate_envelope(&self, event: &serde_json::Value) -> Result<(), ContractViolation> {
        self.check(ENVELOPE_CONTRACT, event)
            .map_err(|diag| ContractViolation {
                diagnostic: format!("envelope validation failed: {diag}"),
            })
    }

    /// Validate a job payload against the job contract
    pub fn validate_job(&self, job: &serde_json::Value) -> Result<(), ContractViolation> {
        self.check(JOB_CONTRACT, job).map_err(|diag| ContractViolation {
            diagnostic: format!("payload validation failed: {diag}"),
        })
    }

    /// Validate a complete message: envelope shape first, then the embedded
    /// payload when the event type is in the `job.` namespace
    ///
    /// Short-circuits on the first failing stage.
    pub fn validate_message(&self, event: &serde_json::Value) -> Result<(), ContractViolation> {
        self.validate_envelope(event)?;

        let event_type = event.get("eventType").and_then(|v| v.as_str()).unwrap_or("");
        if event_type.starts_with("job.") {
            let empty = serde_json::Value::Object(serde_json::Map::new());
            let payload = event.get("payload").unwrap_or(&empty);
            self.validate_job(payload)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ENVELOPE_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "contractVersion": {"type": "string"},
            "eventType": {"type": "string"},
            "eventId": {"type": "string"},
            "occurredAt": {"type": "string"},
            "correlationId": {"type": "string"},
            "idempotencyKey": {"type": "string"},
            "producer": {
                "type": "object",
                "properties": {
                    "service": {"type": "string"},
                    "instance": {"type": "string"},
                    "version": {"type": "string"}
                },
                "required": ["service", "instance", "version"]
            },
            "payload": {"type": "object"}
        },
        "required": [
            "contractVersion", "eventType", "eventId", "occurredAt",
            "correlationId", "idempotencyKey", "producer", "payload"
        ]
    }"#;

    const JOB_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "type": {"type": "string"},
            "status": {"enum": ["PENDING", "PROCESSING", "COMPLETED", "FAILED"]},
            "payload": {"type": "object"},
            "createdAt": {"type": "string"}
        },
        "required": ["id", "type", "status", "createdAt"]
    }"#;

    fn validator() -> ContractValidator {
        ContractValidator::from_schemas(ENVELOPE_SCHEMA, JOB_SCHEMA).unwrap()
    }

    fn valid_event() -> serde_json::Value {
        json!({
            "contractVersion": "1.0.0",
            "eventType": "job.created",
            "eventId": "evt-1",
            "occurredAt": "2026-08-26T12:00:00Z",
            "correlationId": "corr-1",
            "idempotencyKey": "idem-1",
            "producer": {"service": "api", "instance": "api-1", "version": "1.0.0"},
            "payload": {
                "id": "job-1",
                "type": "encode",
                "status": "PENDING",
                "createdAt": "2026-08-26T12:00:00Z"
            }
        })
    }

    #[test]
    fn test_valid_message_passes_both_stages() {
        assert!(validator().validate_message(&valid_event()).is_ok());
    }

    #[test]
    fn test_missing_envelope_fields_are_named_in_diagnostic() {
        let event = json!({"eventType": "job.created"});
        let err = validator().validate_message(&event).unwrap_err();
        assert!(err.diagnostic.starts_with("envelope validation failed:"));
        assert!(err.diagnostic.contains("contractVersion"));
    }

    #[test]
    fn test_diagnostic_is_capped_at_three_violations() {
        // seven required fields missing, only three rendered
        let err = validator().validate_message(&json!({})).unwrap_err();
        assert_eq!(err.diagnostic.matches("; ").count(), 2);
    }

    #[test]
    fn test_invalid_job_payload_short_circuits_after_envelope() {
        let mut event = valid_event();
        event["payload"] = json!({"id": "job-1"});
        let err = validator().validate_message(&event).unwrap_err();
        assert!(err.diagnostic.starts_with("payload validation failed:"));
    }

    #[test]
    fn test_non_job_event_skips_payload_stage() {
        let mut event = valid_event();
        event["eventType"] = json!("audit.recorded");
        event["payload"] = json!({"anything": true});
        assert!(validator().validate_message(&event).is_ok());
    }

    #[test]
    fn test_job_payload_without_optional_payload_field_is_valid() {
        let mut event = valid_event();
        event["payload"].as_object_mut().unwrap().remove("payload");
        assert!(validator().validate_message(&event).is_ok());
    }

    #[test]
    fn test_missing_contract_file_is_configuration_error() {
        let result = ContractValidator::load(Path::new("/nonexistent/schemas"));
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }

    #[test]
    fn test_invalid_schema_document_is_configuration_error() {
        let result = ContractValidator::from_schemas("not json", JOB_SCHEMA);
        assert!(matches!(result, Err(DomainError::Configuration(_))));
    }
}
