//! The Writer abstraction over the Kafka producer (§4.1, §6 of the spec).
//!
//! `Writer` is intentionally narrow — a single `write` operation — so the
//! egress buffer can be driven against a real `rdkafka` producer in
//! production and against [`MockWriter`] in tests, the same separation the
//! teacher draws between `kafka-service`'s `FutureProducer`-backed
//! `MessageProducer` and a test double.

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Error, Debug, Clone)]
pub enum WriterError {
    #[error("kafka producer error: {0}")]
    Kafka(String),
    #[error("write deadline exceeded")]
    Timeout,
    #[error("writer is in a simulated failure state")]
    SimulatedFailure,
}

/// Sink accepting a batch of pre-encoded records. Implementations MUST be
/// safe to call sequentially from a single task (no reentrancy required)
/// and MAY block internally for up to `deadline`. A `transient_error`
/// return means the entire batch is considered undelivered; the caller
/// retries the same records.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, batch: &[Vec<u8>], deadline: Duration) -> Result<(), WriterError>;
}

/// Production `Writer` backed by `rdkafka`'s `FutureProducer`.
///
/// Reliability and performance settings mirror the teacher's
/// `MessageProducer`/`KafkaEventBus` producer configuration: an
/// idempotent, fully-acknowledged producer with bounded retries and
/// zstd compression, so a single Writer submission maps onto a single
/// librdkafka produce-and-wait-for-ack cycle per record in the batch.
pub struct RdKafkaWriter {
    producer: FutureProducer,
    topic: String,
}

impl RdKafkaWriter {
    pub fn new(bootstrap_servers: &str, topic: impl Into<String>) -> Result<Self, WriterError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", "10")
            .set("retry.backoff.ms", "1000")
            .set("compression.type", "zstd")
            .set("linger.ms", "5")
            .set("queue.buffering.max.kbytes", "32768")
            .create()
            .map_err(|e| WriterError::Kafka(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl Writer for RdKafkaWriter {
    async fn write(&self, batch: &[Vec<u8>], deadline: Duration) -> Result<(), WriterError> {
        debug!(batch_len = batch.len(), topic = %self.topic, "submitting batch to kafka");

        let sends = batch.iter().map(|record| {
            let future_record = FutureRecord {
                topic: self.topic.as_str(),
                payload: Some(record.as_slice()),
                partition: None,
                key: None::<&[u8]>,
                timestamp: None,
                headers: None,
            };
            self.producer.send(future_record, Timeout::After(deadline))
        });

        for result in futures::future::join_all(sends).await {
            match result {
                Ok(_) => {}
                Err((kafka_error, _owned_message)) => {
                    error!(error = %kafka_error, "kafka produce failed");
                    return Err(WriterError::Kafka(kafka_error.to_string()));
                }
            }
        }

        info!(batch_len = batch.len(), "batch acknowledged by kafka");
        Ok(())
    }
}

/// Configurable failure modes for [`MockWriter`], as required by the
/// spec's test-collaborator contract (§9 design notes): `set_failed`,
/// `set_deadlock`, `set_delay(batch, per_msg)`, `get_message(i)`.
#[derive(Default)]
struct MockState {
    failed: bool,
    deadlocked: bool,
    batch_delay: Duration,
    per_msg_delay: Duration,
    records: Vec<Vec<u8>>,
}

/// In-memory test double for [`Writer`]. Captures every record it
/// successfully "writes", in order, so tests can assert on exactly what
/// the egress buffer submitted (ignoring or inspecting probe records by
/// their topic field, per §4.3.6).
#[derive(Clone, Default)]
pub struct MockWriter {
    state: Arc<Mutex<MockState>>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_failed(&self, failed: bool) {
        self.state.lock().await.failed = failed;
    }

    /// Makes every subsequent `write` hang until cancelled — used to test
    /// that cancellation unblocks a Writer stuck mid-call (§5, §8 boundary
    /// property).
    pub async fn set_deadlock(&self, deadlocked: bool) {
        self.state.lock().await.deadlocked = deadlocked;
    }

    pub async fn set_delay(&self, batch: Duration, per_msg: Duration) {
        let mut state = self.state.lock().await;
        state.batch_delay = batch;
        state.per_msg_delay = per_msg;
    }

    pub async fn get_message(&self, i: usize) -> Option<Vec<u8>> {
        self.state.lock().await.records.get(i).cloned()
    }

    pub async fn message_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn messages(&self) -> Vec<Vec<u8>> {
        self.state.lock().await.records.clone()
    }
}

#[async_trait]
impl Writer for MockWriter {
    async fn write(&self, batch: &[Vec<u8>], _deadline: Duration) -> Result<(), WriterError> {
        // Hold the lock only long enough to snapshot what we need, so a
        // deadlocked write still lets other MockWriter methods (used by
        // the test harness) make progress concurrently.
        let (failed, deadlocked, batch_delay, per_msg_delay) = {
            let state = self.state.lock().await;
            (
                state.failed,
                state.deadlocked,
                state.batch_delay,
                state.per_msg_delay,
            )
        };

        if deadlocked {
            // Only cancellation unblocks this — matches the distilled
            // spec's "no internal timeout enforcement beyond kafkaTimeout"
            // contract: we deliberately never resolve on our own.
            std::future::pending::<()>().await;
        }

        if batch_delay > Duration::ZERO {
            tokio::time::sleep(batch_delay).await;
        }
        if per_msg_delay > Duration::ZERO {
            tokio::time::sleep(per_msg_delay * batch.len() as u32).await;
        }

        if failed {
            return Err(WriterError::SimulatedFailure);
        }

        let mut state = self.state.lock().await;
        state.records.extend(batch.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_writer_records_successful_batches_in_order() {
        let writer = MockWriter::new();
        writer
            .write(&[b"a".to_vec(), b"b".to_vec()], Duration::from_secs(1))
            .await
            .unwrap();
        writer
            .write(&[b"c".to_vec()], Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(writer.messages().await, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn mock_writer_fails_without_recording_when_set_failed() {
        let writer = MockWriter::new();
        writer.set_failed(true).await;
        let result = writer.write(&[b"x".to_vec()], Duration::from_secs(1)).await;
        assert!(result.is_err());
        assert_eq!(writer.message_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_writer_respects_configured_delay() {
        let writer = MockWriter::new();
        writer
            .set_delay(Duration::from_millis(2), Duration::from_micros(20))
            .await;

        let write = tokio::spawn({
            let writer = writer.clone();
            async move { writer.write(&[b"x".to_vec()], Duration::from_secs(1)).await }
        });

        tokio::time::advance(Duration::from_millis(5)).await;
        write.await.unwrap().unwrap();
    }
}
