/// A message received from the MQTT side of the bridge.
///
/// Created on ingress, never mutated, and dropped once its containing batch
/// has been acknowledged by the Writer (or, on shutdown, once it has been
/// accounted for in the spool).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub topic: String,
    pub content: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
        }
    }
}
