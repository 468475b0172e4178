use serde::{Deserialize, Serialize};

/// PostgreSQL configuration
///
/// Every field carries a serde default so a partially specified
/// environment section deserializes with the remaining fields filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "task_db".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "password123".to_string()
}

fn default_max_pool_size() -> usize {
    10
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password: default_password(),
            max_pool_size: default_max_pool_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_section_deserializes_to_defaults() {
        let config: PostgresConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "task_db");
        assert_eq!(config.max_pool_size, 10);
    }

    #[test]
    fn test_partial_section_fills_remaining_fields() {
        // Overriding one field must not make the others required
        let config: PostgresConfig =
            serde_json::from_value(json!({"host": "db.internal"})).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert_eq!(config.username, "admin");
    }

    #[test]
    fn test_default_impl_matches_serde_defaults() {
        let from_serde: PostgresConfig = serde_json::from_value(json!({})).unwrap();
        let from_default = PostgresConfig::default();
        assert_eq!(from_serde.host, from_default.host);
        assert_eq!(from_serde.port, from_default.port);
        assert_eq!(from_serde.database, from_default.database);
        assert_eq!(from_serde.username, from_default.username);
        assert_eq!(from_serde.password, from_default.password);
        assert_eq!(from_serde.max_pool_size, from_default.max_pool_size);
    }
}
