pub mod error;
pub mod message;
pub mod observability;

pub use error::BridgeError;
pub use message::Message;
pub use observability::{
    notify, ObservabilityEvent, ObservabilityReceiver, ObservabilitySender,
    OBSERVABILITY_CHANNEL_CAPACITY,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_preserves_arbitrary_binary_content() {
        let content = vec![0u8, 255, 1, 2, 0, 254];
        let message = Message::new("sensors/temp", content.clone());
        assert_eq!(message.topic, "sensors/temp");
        assert_eq!(message.content, content);
    }

    #[tokio::test]
    async fn notify_does_not_block_when_receiver_is_slow() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        notify(&tx, ObservabilityEvent::KafkaSent);
        // Channel at capacity now; a second notify must not block or panic.
        notify(&tx, ObservabilityEvent::KafkaSent);
    }

    #[tokio::test]
    async fn notify_is_silent_once_receiver_is_dropped() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        notify(&tx, ObservabilityEvent::MqttReceived);
    }
}
