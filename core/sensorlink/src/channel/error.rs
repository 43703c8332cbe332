//! Errors of the channel execution model.

use std::fmt;

use thiserror::Error;

use super::converter::ConversionError;
use super::ChannelId;

/// Error which can occur during [`Producer::produce`](super::send::Producer::produce).
#[derive(Debug)]
pub enum ProduceError {
    /// Producing failed and the producer cannot recover, the send loop must stop.
    Fatal(anyhow::Error),
    /// The error is temporary, the next iteration may work.
    CanRetry(anyhow::Error),
    /// The producer is done and asks the send loop to terminate. Not an error.
    NormalStop,
}

/// Error which can occur during [`Consumer::consume`](super::receive::Consumer::consume).
#[derive(Debug)]
pub enum ConsumeError {
    /// The consumer cannot recover, the receive loop must stop.
    Fatal(anyhow::Error),
    /// Only this message could not be handled; the loop keeps running.
    CanRetry(anyhow::Error),
}

/// Error raised by [`Outbound::enqueue`](super::send::Outbound::enqueue).
#[derive(Error, Debug)]
pub enum EnqueueError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// The outbound queue is gone, which means the channel was closed.
    #[error("outbound queue of channel {0} is closed")]
    Closed(ChannelId),
}

impl fmt::Display for ProduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProduceError::Fatal(e) => write!(f, "fatal error in Producer::produce: {e}"),
            ProduceError::CanRetry(e) => write!(f, "producing failed (but could work later): {e}"),
            ProduceError::NormalStop => write!(f, "the producer stopped in an expected way (it's fine)"),
        }
    }
}

impl fmt::Display for ConsumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeError::Fatal(e) => write!(f, "fatal error in Consumer::consume: {e}"),
            ConsumeError::CanRetry(e) => write!(f, "consuming failed (message lost): {e}"),
        }
    }
}

// Allow to convert from anyhow::Error to loop errors.

impl<T: Into<anyhow::Error>> From<T> for ProduceError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}

impl<T: Into<anyhow::Error>> From<T> for ConsumeError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}

/// Adds the convenient method `error.retry_produce()`.
pub trait ProduceRetry<T> {
    fn retry_produce(self) -> Result<T, ProduceError>;
}
impl<T, E: Into<anyhow::Error>> ProduceRetry<T> for Result<T, E> {
    /// Turns this error into [`ProduceError::CanRetry`].
    fn retry_produce(self) -> Result<T, ProduceError> {
        self.map_err(|e| ProduceError::CanRetry(e.into()))
    }
}

/// Adds the convenient method `error.retry_consume()`.
pub trait ConsumeRetry<T> {
    fn retry_consume(self) -> Result<T, ConsumeError>;
}
impl<T, E: Into<anyhow::Error>> ConsumeRetry<T> for Result<T, E> {
    /// Turns this error into [`ConsumeError::CanRetry`].
    fn retry_consume(self) -> Result<T, ConsumeError> {
        self.map_err(|e| ConsumeError::CanRetry(e.into()))
    }
}
