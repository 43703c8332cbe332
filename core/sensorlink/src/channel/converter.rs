//! Conversion between application messages and wire bytes.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::message::SensorMessage;

/// Error raised while encoding or decoding a single message.
///
/// Conversion errors are isolated to the offending message: the message is
/// dropped with a logged diagnostic and the owning loop keeps running.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Other(anyhow::Error),
}

/// Maps application messages to their wire representation and back.
///
/// A converter is attached to exactly one channel; the channel's direction
/// decides which of the two operations is exercised.
pub trait MessageConverter: Send + Sync {
    /// Encodes an outbound message, with an optional context hint.
    fn encode(&self, msg: &SensorMessage, hint: Option<&str>) -> Result<Vec<u8>, ConversionError>;

    /// Decodes one inbound frame.
    fn decode(&self, frame: &[u8]) -> Result<SensorMessage, ConversionError>;
}

/// Passes the message body through unchanged.
pub struct IdentityConverter;

impl MessageConverter for IdentityConverter {
    fn encode(&self, msg: &SensorMessage, _hint: Option<&str>) -> Result<Vec<u8>, ConversionError> {
        Ok(msg.text().as_bytes().to_vec())
    }

    fn decode(&self, frame: &[u8]) -> Result<SensorMessage, ConversionError> {
        Ok(SensorMessage::new(String::from_utf8(frame.to_vec())?))
    }
}

/// Prefixes each outbound message with the encode-time epoch timestamp in
/// milliseconds, separated from the body by `\r\n`.
pub struct TimestampConverter;

impl MessageConverter for TimestampConverter {
    fn encode(&self, msg: &SensorMessage, _hint: Option<&str>) -> Result<Vec<u8>, ConversionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ConversionError::Other(e.into()))?;
        Ok(format!("{}\r\n{}", now.as_millis(), msg.text()).into_bytes())
    }

    fn decode(&self, frame: &[u8]) -> Result<SensorMessage, ConversionError> {
        Ok(SensorMessage::new(String::from_utf8(frame.to_vec())?))
    }
}

/// Resolves a message-builder key, as declared in a topology node entry,
/// to one of the converters provided by the core.
///
/// Custom converters are not resolved here: transport plugins are free to
/// accept additional keys in their component builders.
pub fn by_key(key: &str) -> Option<Arc<dyn MessageConverter>> {
    match key {
        "identity" => Some(Arc::new(IdentityConverter)),
        "timestamp" => Some(Arc::new(TimestampConverter)),
        _ => None,
    }
}
