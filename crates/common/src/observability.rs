/// Side-band notification emitted by the egress buffer after every write
/// outcome (or by upstream collaborators, for `MqttReceived`).
///
/// Consumers of this channel must drain it promptly: the buffer's hot path
/// is never allowed to block on a slow observability consumer, so the send
/// side uses a bounded, lossy channel (see [`ObservabilitySender`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityEvent {
    KafkaSent,
    KafkaError,
    MqttReceived,
}

/// Capacity for the bounded observability channel. Chosen generously enough
/// that a burst of batch acknowledgements doesn't immediately start
/// dropping events, while staying small enough that a genuinely stuck
/// consumer is evicted from the hot path rather than back-pressuring it.
pub const OBSERVABILITY_CHANNEL_CAPACITY: usize = 1024;

pub type ObservabilitySender = tokio::sync::mpsc::Sender<ObservabilityEvent>;
pub type ObservabilityReceiver = tokio::sync::mpsc::Receiver<ObservabilityEvent>;

/// Send an observability event without blocking the caller.
///
/// If the receiver is slow or has been dropped, the event is silently
/// discarded rather than back-pressuring the hot path — the collaborator
/// consuming this channel, not the egress buffer, owns the choice between
/// dropping and blocking.
pub fn notify(sender: &ObservabilitySender, event: ObservabilityEvent) {
    if let Err(err) = sender.try_send(event) {
        tracing::debug!(?err, "observability channel full or closed, dropping event");
    }
}
