//! Bridges an MQTT broker's publish stream into the egress buffer's
//! ingress channel.
//!
//! This crate is deliberately thin — a single collaborator, grounded the
//! same way the teacher's `crates/webhook` is a single collaborator that
//! receives external input (there, WhatsApp's HTTP webhook calls; here,
//! an MQTT broker's publishes) and republishes it onto the shared egress
//! abstraction. The distilled spec's core is the egress buffer; this is
//! the ingress-side plumbing it assumes exists.

use crate::config::MqttConfig;
use common::{notify, Message, ObservabilityEvent, ObservabilitySender};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum MqttSourceError {
    #[error("mqtt subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

/// Subscribes to `config.topic_filter` and forwards every publish as a
/// [`Message`] onto `egress_tx`. Runs until the egress channel is
/// closed (the buffer has shut down) — there is no separate
/// cancellation token here because the ingress channel closing is
/// itself the shutdown signal for this collaborator.
pub struct MqttSource {
    config: MqttConfig,
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
}

impl MqttSource {
    pub async fn connect(config: MqttConfig) -> Result<Self, MqttSourceError> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);

        let (client, eventloop) = AsyncClient::new(options, 256);
        client.subscribe(&config.topic_filter, QoS::AtLeastOnce).await?;

        info!(host = %config.host, port = config.port, filter = %config.topic_filter, "subscribed to mqtt broker");

        Ok(Self { config, client, eventloop })
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Drive the MQTT event loop, forwarding publishes into `egress_tx`
    /// until it closes. Connection errors are logged and retried after
    /// `reconnect_backoff` — `rumqttc`'s `EventLoop` itself owns
    /// reconnection once the transient error has passed.
    pub async fn run(mut self, egress_tx: mpsc::Sender<Message>, obs_tx: ObservabilitySender) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = Message::new(publish.topic, publish.payload.to_vec());
                    notify(&obs_tx, ObservabilityEvent::MqttReceived);
                    if egress_tx.send(message).await.is_err() {
                        info!("egress buffer closed its ingress channel, stopping mqtt source");
                        return;
                    }
                }
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {
                    debug!("mqtt control packet");
                }
                Err(err) => {
                    warn!(error = %err, "mqtt connection error, retrying");
                    tokio::time::sleep(self.config.reconnect_backoff).await;
                }
            }
        }
    }
}
