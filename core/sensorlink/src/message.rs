//! The application-level message type carried by channels.

use std::fmt;

/// A text message produced or consumed by a sensor.
///
/// This is the application-level view of a message.
/// The wire representation is produced by the channel's
/// [`MessageConverter`](crate::channel::converter::MessageConverter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorMessage {
    text: String,
}

impl SensorMessage {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for SensorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<String> for SensorMessage {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for SensorMessage {
    fn from(text: &str) -> Self {
        Self { text: text.to_owned() }
    }
}
