//! End-to-end tests for [`EgressBuffer`] driven against [`MockWriter`].
//! These exercise the literal scenarios the state machine was designed
//! against: happy path, failure/recovery, a fatal cold start, a
//! deadlocked Writer racing cancellation, interleaved slow writes, and
//! two large-scale batch-recovery shapes with exact counter assertions.

use kafka_egress::{ingress_channel, BufferStats, EgressBuffer, EgressConfig, MockWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn content_of(record: &[u8]) -> Vec<u8> {
    let text = std::str::from_utf8(record).unwrap();
    let content_line = text.lines().find(|l| l.starts_with("Content: ")).unwrap();
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, content_line.trim_start_matches("Content: ")).unwrap()
}

fn topic_of(record: &[u8]) -> String {
    let text = std::str::from_utf8(record).unwrap();
    text.lines()
        .find(|l| l.starts_with("Topic: "))
        .unwrap()
        .trim_start_matches("Topic: ")
        .to_string()
}

fn spawn_buffer(config: EgressConfig, writer: MockWriter) -> (tokio::task::JoinHandle<Result<BufferStats, kafka_egress::EgressError>>, tokio::sync::mpsc::Sender<common::Message>, CancellationToken) {
    let (tx, rx) = ingress_channel();
    let (obs_tx, _obs_rx) = tokio::sync::mpsc::channel(common::OBSERVABILITY_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let buffer = EgressBuffer::new(config, Arc::new(writer), obs_tx, cancel.clone());
    let handle = tokio::spawn(buffer.run(rx));
    (handle, tx, cancel)
}

#[tokio::test(start_paused = true)]
async fn happy_path_interleaves_probe_with_user_content_in_order() {
    let writer = MockWriter::new();
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        batch_size: 100,
        max_batch_size: 1000,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    for i in 0..10u32 {
        tx.send(common::Message::new("sensors/a", i.to_string().into_bytes()))
            .await
            .unwrap();
    }

    // Let the flush tick catch the partial batch.
    tokio::time::advance(Duration::from_millis(5)).await;
    tokio::task::yield_now().await;

    cancel.cancel();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(stats.msgs, 11);
    assert_eq!(writer.message_count().await, 11);
    assert_eq!(topic_of(&writer.get_message(0).await.unwrap()), "test");
    for i in 0..10u32 {
        let record = writer.get_message(1 + i as usize).await.unwrap();
        assert_eq!(content_of(&record), i.to_string().into_bytes());
    }
}

#[tokio::test(start_paused = true)]
async fn failure_and_recovery_preserves_order_with_exactly_one_failure() {
    let writer = MockWriter::new();
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        failure_retry_interval: Duration::from_millis(50),
        batch_size: 100,
        max_batch_size: 1000,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    for i in 0..5u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
    }
    tokio::time::advance(Duration::from_millis(5)).await;
    tokio::task::yield_now().await;

    writer.set_failed(true).await;
    for i in 5..10u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
    }
    tokio::time::advance(Duration::from_millis(100)).await;
    tokio::task::yield_now().await;

    writer.set_failed(false).await;
    tokio::time::advance(Duration::from_secs(1)).await;
    tokio::task::yield_now().await;

    cancel.cancel();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(stats.failures, 1);

    let user_contents: Vec<Vec<u8>> = writer
        .messages()
        .await
        .into_iter()
        .filter(|r| topic_of(r) != "test")
        .map(|r| content_of(&r))
        .collect();
    let expected: Vec<Vec<u8>> = (0..10u32).map(|i| i.to_string().into_bytes()).collect();
    assert_eq!(user_contents, expected);
}

#[tokio::test]
async fn startup_failure_returns_a_fatal_error() {
    let writer = MockWriter::new();
    writer.set_failed(true).await;
    let config = EgressConfig::default();
    let (handle, _tx, cancel) = spawn_buffer(config, writer);

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn deadlocked_writer_unblocks_promptly_on_cancellation() {
    let writer = MockWriter::new();
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        batch_size: 5,
        max_batch_size: 1000,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    writer.set_deadlock(true).await;
    for i in 0..50u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(result.is_ok(), "run() must return promptly once cancelled, even mid-deadlock");
    result.unwrap().unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_writer_preserves_message_order() {
    let writer = MockWriter::new();
    writer.set_delay(Duration::from_millis(2), Duration::from_micros(20)).await;
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        batch_size: 50,
        max_batch_size: 200,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    for i in 0..500u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
        tokio::time::advance(Duration::from_micros(10)).await;
    }
    tokio::time::advance(Duration::from_secs(1)).await;
    tokio::task::yield_now().await;

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let user_contents: Vec<Vec<u8>> = writer
        .messages()
        .await
        .into_iter()
        .filter(|r| topic_of(r) != "test")
        .map(|r| content_of(&r))
        .collect();
    let expected: Vec<Vec<u8>> = (0..500u32).map(|i| i.to_string().into_bytes()).collect();
    assert_eq!(user_contents, expected);
}

#[tokio::test(start_paused = true)]
async fn batch_recovery_matches_exact_counters() {
    let writer = MockWriter::new();
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        failure_retry_interval: Duration::from_millis(50),
        batch_size: 100,
        max_batch_size: 1000,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    tx.send(common::Message::new("t", b"0".to_vec())).await.unwrap();
    tokio::time::advance(Duration::from_millis(5)).await;
    tokio::task::yield_now().await;

    writer.set_failed(true).await;
    for i in 0..10_000u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
    }
    tokio::time::advance(Duration::from_millis(5)).await;
    tokio::task::yield_now().await;

    writer.set_failed(false).await;
    tokio::time::advance(Duration::from_secs(2)).await;
    tokio::task::yield_now().await;

    cancel.cancel();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(stats.msgs, 10_002);
    assert_eq!(stats.writes, 12);
    assert_eq!(stats.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn recovery_interrupted_mid_despool_preserves_order() {
    let writer = MockWriter::new();
    let config = EgressConfig {
        interval: Duration::from_millis(1),
        failure_retry_interval: Duration::from_millis(20),
        batch_size: 10,
        max_batch_size: 100,
        ..EgressConfig::default()
    };
    let (handle, tx, cancel) = spawn_buffer(config, writer.clone());

    writer.set_failed(true).await;
    for i in 1..=1000u32 {
        tx.send(common::Message::new("t", i.to_string().into_bytes())).await.unwrap();
    }
    tokio::time::advance(Duration::from_millis(5)).await;
    tokio::task::yield_now().await;

    writer.set_failed(false).await;

    loop {
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        if writer.message_count().await >= 500 {
            break;
        }
    }

    writer.set_failed(true).await;
    tokio::time::advance(Duration::from_millis(100)).await;
    tokio::task::yield_now().await;
    writer.set_failed(false).await;

    loop {
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        if writer.message_count().await >= 1000 {
            break;
        }
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let user_contents: Vec<Vec<u8>> = writer
        .messages()
        .await
        .into_iter()
        .filter(|r| topic_of(r) != "test")
        .map(|r| content_of(&r))
        .collect();
    let expected: Vec<Vec<u8>> = (1..=1000u32).map(|i| i.to_string().into_bytes()).collect();
    assert_eq!(user_contents, expected);
}
