use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Absent: rate limiting is disabled.
    pub redis: Option<RedisConfig>,
    /// Absent: notifications go to the log.
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_child_fare_ratio")]
    pub child_fare_ratio: f64,
    #[serde(default = "default_true")]
    pub require_return_after_departure: bool,
    #[serde(default = "default_max_booking_attempts")]
    pub max_booking_attempts: u32,
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_child_fare_ratio() -> f64 { 0.75 }
fn default_true() -> bool { true }
fn default_max_booking_attempts() -> u32 { 3 }
fn default_transaction_timeout_secs() -> u64 { 10 }
fn default_notification_queue_capacity() -> usize { 1024 }
fn default_rate_limit() -> i64 { 100 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            child_fare_ratio: default_child_fare_ratio(),
            require_return_after_departure: true,
            max_booking_attempts: default_max_booking_attempts(),
            transaction_timeout_secs: default_transaction_timeout_secs(),
            notification_queue_capacity: default_notification_queue_capacity(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
}

fn default_notification_topic() -> String { "notifications.email".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer-local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // JETWAY__DATABASE__URL=... sets database.url
            .add_source(config::Environment::with_prefix("JETWAY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse(
            r#"
            [server]
            port = 3000
            [database]
            url = "postgres://localhost/jetway"
            [auth]
            jwt_secret = "secret"
            "#,
        );

        assert_eq!(cfg.database.max_connections, 5);
        assert!(cfg.redis.is_none());
        assert!(cfg.kafka.is_none());
        assert_eq!(cfg.business_rules.max_booking_attempts, 3);
        assert_eq!(cfg.business_rules.transaction_timeout_secs, 10);
        assert!(cfg.business_rules.require_return_after_departure);
        assert_eq!(cfg.business_rules.child_fare_ratio, 0.75);
    }

    #[test]
    fn test_overrides_and_optional_sections() {
        let cfg = parse(
            r#"
            [server]
            port = 8080
            [database]
            url = "postgres://db/jetway"
            max_connections = 20
            [kafka]
            brokers = "kafka:9092"
            [auth]
            jwt_secret = "secret"
            [business_rules]
            require_return_after_departure = false
            child_fare_ratio = 0.5
            "#,
        );

        assert_eq!(cfg.database.max_connections, 20);
        let kafka = cfg.kafka.unwrap();
        assert_eq!(kafka.notification_topic, "notifications.email");
        assert!(!cfg.business_rules.require_return_after_departure);
        assert_eq!(cfg.business_rules.child_fare_ratio, 0.5);
        assert_eq!(cfg.business_rules.notification_queue_capacity, 1024);
    }
}
