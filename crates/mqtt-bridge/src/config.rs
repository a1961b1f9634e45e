use std::time::Duration;

/// MQTT connection settings for [`crate::source::MqttSource`].
///
/// Mirrors the teacher's `KafkaConfig::from_env` shape (`dotenv` +
/// `std::env::var` + `unwrap_or_else` defaults, `.expect()` on the values
/// that have no sane default).
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic_filter: String,
    pub keep_alive: Duration,
    pub reconnect_backoff: Duration,
}

impl MqttConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            host: std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("MQTT_PORT")
                .unwrap_or_else(|_| "1883".to_string())
                .parse()
                .expect("MQTT_PORT must be a valid port number"),
            client_id: std::env::var("MQTT_CLIENT_ID")
                .unwrap_or_else(|_| "metamorphosis".to_string()),
            topic_filter: std::env::var("MQTT_TOPIC_FILTER")
                .unwrap_or_else(|_| "#".to_string()),
            keep_alive: Duration::from_secs(
                std::env::var("MQTT_KEEP_ALIVE_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("MQTT_KEEP_ALIVE_SECS must be a valid number"),
            ),
            reconnect_backoff: Duration::from_millis(
                std::env::var("MQTT_RECONNECT_BACKOFF_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .expect("MQTT_RECONNECT_BACKOFF_MS must be a valid number"),
            ),
        }
    }
}
