use std::time::Duration;

/// Configuration for an [`crate::buffer::EgressBuffer`] (§4.3.2).
///
/// Deliberately not env-parsed here — this crate stays a pure library.
/// The `metamorphosis` binary loads these values from the environment
/// (the teacher's `AppConfig::from_env` idiom) and builds this struct.
#[derive(Debug, Clone)]
pub struct EgressConfig {
    /// Max latency between message arrival and a flush attempt under
    /// normal (ALIVE) load.
    pub interval: Duration,
    /// Period between probe attempts while DOWN.
    pub failure_retry_interval: Duration,
    /// Soft target: flushes trigger once the spool reaches this size.
    pub batch_size: usize,
    /// Hard cap on a single submitted batch.
    pub max_batch_size: usize,
    /// Per-write deadline passed to the Writer.
    pub kafka_timeout: Duration,
    /// Kafka topic for all user records (the bridge is single-topic).
    pub topic: String,
    /// Topic placed inside probe records.
    pub test_message_topic: String,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2),
            failure_retry_interval: Duration::from_secs(10),
            batch_size: 100,
            max_batch_size: 1000,
            kafka_timeout: Duration::from_secs(5),
            topic: "metamorphosis".to_string(),
            test_message_topic: "test".to_string(),
        }
    }
}
