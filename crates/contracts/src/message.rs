//! Message - the unit delivered by the queue
//!
//! A `Delivery` is what the queue hands over (id + raw bytes + attempt count).
//! A `Message` is a delivery whose body has been decoded as JSON; it is built
//! once per delivery and shared read-only by every handler.

use std::fmt;

use bytes::Bytes;
use serde_json::Value;

use crate::ContractError;

/// Length of a queue message id in bytes
pub const MESSAGE_ID_LEN: usize = 16;

/// Fixed-length message identifier assigned by the queue
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageId([u8; MESSAGE_ID_LEN]);

impl MessageId {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; MESSAGE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a string, truncating or zero-padding to the fixed length
    pub fn from_str_lossy(id: &str) -> Self {
        let mut bytes = [0u8; MESSAGE_ID_LEN];
        let src = id.as_bytes();
        let n = src.len().min(MESSAGE_ID_LEN);
        bytes[..n].copy_from_slice(&src[..n]);
        Self(bytes)
    }

    /// Sequential id rendered as 16 hex digits
    pub fn from_sequence(seq: u64) -> Self {
        Self::from_str_lossy(&format!("{seq:016x}"))
    }

    /// Raw id bytes
    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .0
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(MESSAGE_ID_LEN);
        f.write_str(&String::from_utf8_lossy(&self.0[..end]))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({self})")
    }
}

/// A raw delivery from the queue
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Queue-assigned id
    pub id: MessageId,
    /// Raw body bytes (expected to be JSON)
    pub body: Bytes,
    /// Number of times this delivery has been attempted (starts at 1)
    pub attempts: u16,
}

impl Delivery {
    /// Create a first-attempt delivery
    pub fn new(id: MessageId, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            body: body.into(),
            attempts: 1,
        }
    }
}

/// A decoded message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Queue-assigned id
    pub id: MessageId,
    /// Raw body, forwarded verbatim to the store
    pub body: Bytes,
    /// Decoded JSON document, used for key/channel templates
    pub json: Value,
}

impl Message {
    /// Decode a message body
    ///
    /// # Errors
    /// Returns `ContractError::MalformedPayload` when the body is not valid JSON
    pub fn parse(id: MessageId, body: Bytes) -> Result<Self, ContractError> {
        let json = serde_json::from_slice(&body).map_err(|e| ContractError::MalformedPayload {
            message_id: id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { id, body, json })
    }

    /// Convenience constructor from string id and body
    pub fn new(id: &str, body: &str) -> Result<Self, ContractError> {
        Self::parse(
            MessageId::from_str_lossy(id),
            Bytes::copy_from_slice(body.as_bytes()),
        )
    }
}

impl TryFrom<&Delivery> for Message {
    type Error = ContractError;

    fn try_from(delivery: &Delivery) -> Result<Self, Self::Error> {
        Self::parse(delivery.id, delivery.body.clone())
    }
}
