use std::time::Duration;

use kafka_egress::EgressConfig;
use mqtt_bridge::MqttConfig;

/// Process-wiring configuration: everything the `metamorphosis` binary
/// needs to build an [`EgressConfig`] and [`MqttConfig`] and start the
/// observability HTTP endpoint.
///
/// Grounded on the teacher's `KafkaConfig::from_env` / `AppConfig`
/// (`crates/kafka-service/src/config.rs`): `dotenv::dotenv().ok()` first,
/// then `std::env::var` with `unwrap_or_else` defaults for optional
/// settings and `.expect()` for settings with no sane default.
pub struct AppConfig {
    pub kafka_bootstrap_servers: String,
    pub egress: EgressConfig,
    pub mqtt: MqttConfig,
    pub health_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let egress = EgressConfig {
            interval: Duration::from_millis(env_parse("EGRESS_FLUSH_INTERVAL_MS", 2)),
            failure_retry_interval: Duration::from_secs(env_parse("EGRESS_FAILURE_RETRY_SECS", 10)),
            batch_size: env_parse("EGRESS_BATCH_SIZE", 100),
            max_batch_size: env_parse("EGRESS_MAX_BATCH_SIZE", 1000),
            kafka_timeout: Duration::from_secs(env_parse("EGRESS_KAFKA_TIMEOUT_SECS", 5)),
            topic: std::env::var("KAFKA_OUTPUT_TOPIC").unwrap_or_else(|_| "metamorphosis".to_string()),
            test_message_topic: std::env::var("EGRESS_TEST_MESSAGE_TOPIC")
                .unwrap_or_else(|_| "test".to_string()),
        };

        Self {
            kafka_bootstrap_servers: std::env::var("KAFKA_BOOTSTRAP_SERVERS")
                .expect("KAFKA_BOOTSTRAP_SERVERS must be set"),
            egress,
            mqtt: MqttConfig::from_env(),
            health_addr: std::env::var("HEALTH_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|err| panic!("{key} must be valid: {err:?}")),
        Err(_) => default,
    }
}
