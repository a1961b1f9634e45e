//! Process wiring for the MQTT-to-Kafka bridge: loads configuration,
//! starts the MQTT source, the Kafka egress buffer, and the observability
//! HTTP endpoint, and shuts all three down together on `Ctrl+C`.
//!
//! Grounded on the teacher's `crates/kafka-service/src/main.rs`
//! (`tokio::select!` racing the service's run future against
//! `tokio::signal::ctrl_c()`, `tracing_subscriber::fmt().with_env_filter`)
//! and `crates/webhook`'s axum server bring-up for the health endpoint.

mod config;
mod health;

use std::sync::Arc;

use anyhow::Context;
use config::AppConfig;
use kafka_egress::{ingress_channel, EgressBuffer, RdKafkaWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("metamorphosis=info,kafka_egress=info,mqtt_bridge=info,rdkafka=info")
        .init();

    let config = AppConfig::from_env();
    let cancel = CancellationToken::new();

    let writer = Arc::new(
        RdKafkaWriter::new(&config.kafka_bootstrap_servers, config.egress.topic.clone())
            .context("failed to construct kafka writer")?,
    );
    let (obs_tx, obs_rx) = mpsc::channel(common::OBSERVABILITY_CHANNEL_CAPACITY);
    let (ingress_tx, ingress_rx) = ingress_channel();

    let buffer = EgressBuffer::new(config.egress, writer, obs_tx.clone(), cancel.clone());
    let stats_rx = buffer.subscribe();

    let mqtt_source = mqtt_bridge::MqttSource::connect(config.mqtt)
        .await
        .context("failed to connect to mqtt broker")?;

    let health_router = health::router(health::HealthState::new(stats_rx));
    let health_listener = tokio::net::TcpListener::bind(&config.health_addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {}", config.health_addr))?;
    info!(addr = %config.health_addr, "observability endpoint listening");

    let mqtt_task = tokio::spawn(mqtt_source.run(ingress_tx, obs_tx.clone()));
    let observability_task = tokio::spawn(observability_logger(obs_rx));
    let health_cancel = cancel.clone();
    let health_task = tokio::spawn(async move {
        axum::serve(health_listener, health_router)
            .with_graceful_shutdown(async move { health_cancel.cancelled().await })
            .await
    });
    let mut buffer_task = tokio::spawn(buffer.run(ingress_rx));

    let buffer_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, signalling shutdown");
            cancel.cancel();
            buffer_task.await.context("egress buffer task panicked")?
        }
        result = &mut buffer_task => {
            result.context("egress buffer task panicked")?
        }
    };

    mqtt_task.abort();
    observability_task.abort();
    let _ = health_task.await;

    match buffer_result {
        Ok(stats) => {
            info!(?stats, "metamorphosis shut down cleanly");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "egress buffer failed to start");
            Err(err.into())
        }
    }
}

/// Drains the observability channel and logs each event at debug level.
/// A real deployment would forward these into a metrics registry (e.g. a
/// Prometheus counter per variant); logging is the minimal collaborator
/// the core spec assumes exists to "consume promptly" (§5).
async fn observability_logger(mut rx: mpsc::Receiver<common::ObservabilityEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::debug!(?event, "observability event");
    }
}
