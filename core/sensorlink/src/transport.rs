//! The transport capability consumed by channels.
//!
//! A [`Transport`] knows how to connect to one addressable unit of a message
//! broker (for instance one queue). Opening it yields a [`TransportLink`],
//! which is exclusively owned by the [`Channel`](crate::channel::Channel)
//! that opened it. The core is agnostic to the broker wire protocol.

use thiserror::Error;
use tokio::sync::mpsc;

/// Error raised by the underlying message transport.
///
/// Transport errors are never retried by the core: they are propagated to
/// the caller of `open`/`enqueue`, which decides the retry policy.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection to the broker could not be established
    /// (network failure, authentication failure, bad address).
    #[error("failed to connect to the transport: {0}")]
    Connection(String),
    /// An outbound frame could not be handed to the broker.
    #[error("transport send failed: {0}")]
    Send(String),
    /// The inbound subscription could not be installed.
    #[error("transport subscription failed: {0}")]
    Subscribe(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A connection factory for one transport endpoint.
pub trait Transport: Send {
    /// Establishes the connection and returns the link.
    ///
    /// Not retried internally: a failure is propagated to the caller.
    fn open(&self) -> Result<Box<dyn TransportLink>, TransportError>;
}

/// An established transport connection.
///
/// A link is exclusively owned by the channel (or channel task) that opened
/// it; it must never be shared between two channels.
pub trait TransportLink: Send {
    /// Hands one encoded frame to the broker for asynchronous delivery.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Installs the inbound delivery of this link.
    ///
    /// The transport pushes each received frame into `frames`, in delivery
    /// order. Delivery stops when the receiving half is dropped or the link
    /// is closed.
    fn subscribe(&mut self, frames: mpsc::Sender<Vec<u8>>) -> Result<(), TransportError>;

    /// Releases the connection. Idempotent, never fails.
    fn close(&mut self);
}
