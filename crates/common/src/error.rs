use thiserror::Error;

/// Errors surfaced at the process-wiring boundary: config loading, MQTT
/// connection setup, and the fatal case bubbled up from the egress buffer's
/// startup probe. Internal-to-the-buffer failure handling (transient write
/// failures, probe failures while DOWN, codec failures) never reaches this
/// type — see `kafka_egress::buffer::EgressError` for that.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("mqtt connection error: {0}")]
    Mqtt(String),

    #[error("egress buffer failed to start: {0}")]
    EgressStartup(String),
}
