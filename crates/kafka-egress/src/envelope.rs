//! Encodes a [`Message`] to the self-contained, binary-safe record payload
//! submitted to the Writer.
//!
//! The wire format is a small textual key-value record with exactly two
//! named fields, `Topic` and `Content`. `Content` is base64-encoded so that
//! arbitrary binary payloads survive the round trip byte-for-byte while the
//! record as a whole stays human-readable in logs and test fixtures.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::Message;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("record is missing a required field: {0}")]
    MissingField(&'static str),
    #[error("content field is not valid base64")]
    InvalidBase64,
    #[error("topic field is not valid UTF-8")]
    InvalidTopicUtf8,
}

/// Encode a [`Message`] to its wire `Record` form. Never fails for a
/// well-formed `Message` (UTF-8 topic, arbitrary bytes content) — the only
/// failure mode the distilled spec anticipates at this layer (an
/// un-serializable message) cannot occur for this encoding, since base64
/// accepts any byte sequence. The `Result` is kept regardless, so a future
/// encoding change that can fail doesn't require touching every call site.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let mut record = String::with_capacity(message.topic.len() + message.content.len() + 32);
    record.push_str("Topic: ");
    record.push_str(&message.topic);
    record.push_str("\nContent: ");
    STANDARD.encode_string(&message.content, &mut record);
    record.push('\n');
    Ok(record.into_bytes())
}

/// Decode a wire `Record` back to a [`Message`].
///
/// Exercised only by this crate's own tests and by test collaborators that
/// want to assert on what was actually sent — production code treats the
/// Writer's input as opaque and never calls this.
pub fn decode(record: &[u8]) -> Result<Message, CodecError> {
    let text = std::str::from_utf8(record).map_err(|_| CodecError::InvalidTopicUtf8)?;
    let topic_line = text
        .lines()
        .find(|line| line.starts_with("Topic: "))
        .ok_or(CodecError::MissingField("Topic"))?;
    let content_line = text
        .lines()
        .find(|line| line.starts_with("Content: "))
        .ok_or(CodecError::MissingField("Content"))?;

    let topic = topic_line.trim_start_matches("Topic: ").to_string();
    let content_b64 = content_line.trim_start_matches("Content: ");
    let content = STANDARD
        .decode(content_b64)
        .map_err(|_| CodecError::InvalidBase64)?;

    Ok(Message { topic, content })
}
