use config::{Config, ConfigError, Environment};
use processor_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS JetStream stream holding all job subjects
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Inbound subject carrying job.created events
    #[serde(default = "default_inbound_subject")]
    pub inbound_subject: String,

    /// Outbound subject for completion events
    #[serde(default = "default_outbound_subject")]
    pub outbound_subject: String,

    /// Quarantine subject for messages that failed contract validation
    #[serde(default = "default_dead_letter_subject")]
    pub dead_letter_subject: String,

    /// Durable consumer name
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Max wait for a fetch before polling again, in seconds
    #[serde(default = "default_fetch_wait_secs")]
    pub fetch_wait_secs: u64,

    /// Delay before a transiently failed message is redelivered, in
    /// seconds; 0 requests immediate redelivery
    #[serde(default)]
    pub redelivery_delay_secs: u64,

    /// Directory containing the contract schema documents
    #[serde(default = "default_contracts_path")]
    pub contracts_path: String,

    /// Simulated unit-of-work duration in milliseconds
    #[serde(default = "default_work_delay_ms")]
    pub work_delay_ms: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_stream() -> String {
    "jobs".to_string()
}

fn default_inbound_subject() -> String {
    "jobs.created".to_string()
}

fn default_outbound_subject() -> String {
    "jobs.completed".to_string()
}

fn default_dead_letter_subject() -> String {
    "jobs.failed.validation".to_string()
}

fn default_consumer_name() -> String {
    "processor".to_string()
}

fn default_fetch_wait_secs() -> u64 {
    5
}

fn default_contracts_path() -> String {
    "contracts/schemas".to_string()
}

fn default_work_delay_ms() -> u64 {
    2000
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("PROCESSOR").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::remove_var("PROCESSOR_LOG_LEVEL");
        std::env::remove_var("PROCESSOR_INBOUND_SUBJECT");
        std::env::remove_var("PROCESSOR_WORK_DELAY_MS");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.inbound_subject, "jobs.created");
        assert_eq!(config.outbound_subject, "jobs.completed");
        assert_eq!(config.dead_letter_subject, "jobs.failed.validation");
        assert_eq!(config.work_delay_ms, 2000);
        assert_eq!(config.redelivery_delay_secs, 0);
    }

    #[test]
    fn test_partial_postgres_section_keeps_field_defaults() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("PROCESSOR_POSTGRES__HOST", "db.internal");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.postgres.host, "db.internal");
        // one override must not make the rest of the section required
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.database, "task_db");

        std::env::remove_var("PROCESSOR_POSTGRES__HOST");
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("PROCESSOR_LOG_LEVEL", "debug");
        std::env::set_var("PROCESSOR_INBOUND_SUBJECT", "jobs.created.test");
        std::env::set_var("PROCESSOR_WORK_DELAY_MS", "0");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.inbound_subject, "jobs.created.test");
        assert_eq!(config.work_delay_ms, 0);

        // Clean up
        std::env::remove_var("PROCESSOR_LOG_LEVEL");
        std::env::remove_var("PROCESSOR_INBOUND_SUBJECT");
        std::env::remove_var("PROCESSOR_WORK_DELAY_MS");
    }
}
