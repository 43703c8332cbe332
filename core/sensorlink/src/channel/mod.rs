//! Transport-backed, directional message channels.
//!
//! A [`Channel`] is the basic addressable unit of communication: it owns one
//! transport connection and one [converter](converter::MessageConverter),
//! carries a fixed [`Direction`], and is identified by `(group, name)` within
//! a [`SensorContext`](crate::sensor::SensorContext).
//!
//! An OUT channel runs a [send loop](send), an IN channel runs a
//! [receive loop](receive). Each loop is an independent Tokio task, so a slow
//! or blocked producer cannot stall other channels. Messages on a single
//! channel preserve FIFO order; no ordering is guaranteed across channels.

pub mod converter;
pub mod error;
pub mod receive;
pub mod send;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::transport::{Transport, TransportError, TransportLink};

use converter::MessageConverter;
use receive::Consumer;
use send::{Outbound, Producer};

/// Identifies a channel within a sensor context: `(group, name)`.
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId {
    group: String,
    name: String,
}

impl ChannelId {
    pub fn new<G: Into<String>, N: Into<String>>(group: G, name: N) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// The direction of a channel, fixed at creation.
///
/// The direction determines which loop type is legal on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Error raised when a channel is driven in a way its state or direction
/// does not allow.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel {id} is not open")]
    NotOpen { id: ChannelId },
    #[error("channel {id} has direction {actual:?}, this operation requires {required:?}")]
    WrongDirection {
        id: ChannelId,
        required: Direction,
        actual: Direction,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    Created,
    Open,
    Running,
    Closed,
}

/// A named, directional, transport-backed communication endpoint.
///
/// The channel owns its transport link exclusively; the link is released
/// exactly once, either by [`close`](Channel::close) or by the loop task
/// that took it over.
pub struct Channel {
    id: ChannelId,
    direction: Direction,
    converter: Arc<dyn MessageConverter>,
    capacity: usize,
    properties: toml::Table,
    transport: Box<dyn Transport>,
    link: Option<Box<dyn TransportLink>>,
    state: State,
    shutdown: CancellationToken,
    tasks: JoinSet<anyhow::Result<()>>,
}

impl Channel {
    /// Default capacity of the bounded per-channel queue.
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(
        id: ChannelId,
        direction: Direction,
        transport: Box<dyn Transport>,
        converter: Arc<dyn MessageConverter>,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            direction,
            converter,
            capacity,
            properties: toml::Table::new(),
            transport,
            link: None,
            state: State::Created,
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Attaches the per-channel property subset (for instance the queue name
    /// on the broker).
    pub fn with_properties(mut self, properties: toml::Table) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn properties(&self) -> &toml::Table {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&toml::Value> {
        self.properties.get(key)
    }

    /// Acquires the transport link.
    ///
    /// Fails with a [`TransportError`] if the connection cannot be
    /// established; the error is not retried internally. Calling `open` on
    /// an already open channel does nothing.
    pub fn open(&mut self) -> Result<(), TransportError> {
        if self.state == State::Created {
            self.link = Some(self.transport.open()?);
            self.state = State::Open;
        }
        Ok(())
    }

    /// Takes over the link and spawns the drain task, returning the write
    /// half of the channel.
    ///
    /// Requires an open OUT channel. Enqueuing on the returned [`Outbound`]
    /// converts the message and pushes the frame onto the bounded queue,
    /// waiting for space when the queue is full.
    pub fn outbound(&mut self, rt: &runtime::Handle) -> Result<Outbound, ChannelError> {
        self.require_direction(Direction::Out)?;
        let link = self.take_link()?;
        let (tx, rx) = mpsc::channel(self.capacity);
        self.tasks
            .spawn_on(send::run_drain(self.id.clone(), link, rx, self.shutdown.clone()), rt);
        Ok(Outbound {
            id: self.id.clone(),
            converter: self.converter.clone(),
            frames: tx,
        })
    }

    /// Binds this OUT channel to a periodic producer.
    ///
    /// The producer is invoked once per iteration, with `interval` between
    /// iterations, on an independent task. Cancellation (via
    /// [`close`](Channel::close)) is observed at the top of each iteration,
    /// within at most one `interval` period.
    pub fn start_send_loop(
        &mut self,
        producer: Box<dyn Producer>,
        interval: Duration,
        rt: &runtime::Handle,
    ) -> Result<(), ChannelError> {
        let outbound = self.outbound(rt)?;
        self.tasks.spawn_on(
            send::run_produce(self.id.clone(), producer, outbound, interval, self.shutdown.clone()),
            rt,
        );
        Ok(())
    }

    /// Binds this IN channel to an asynchronous consumer.
    ///
    /// The transport pushes inbound frames; each one is decoded once via the
    /// channel's converter before the consumer is invoked, in delivery order.
    pub fn start_receive_loop(
        &mut self,
        consumer: Box<dyn Consumer>,
        rt: &runtime::Handle,
    ) -> Result<(), ChannelError> {
        self.require_direction(Direction::In)?;
        let link = self.take_link()?;
        self.tasks.spawn_on(
            receive::run_receive(
                self.id.clone(),
                link,
                self.converter.clone(),
                consumer,
                self.capacity,
                self.shutdown.clone(),
            ),
            rt,
        );
        Ok(())
    }

    /// Releases the channel. Safe to call multiple times, never fails.
    ///
    /// Running loops observe the cancellation at their next suspension point
    /// and release the link themselves; in-flight consumer invocations are
    /// allowed to complete.
    pub fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.state = State::Closed;
    }

    /// Closes the channel and waits for its loop tasks to finish.
    ///
    /// Returns the first task error, if any; the others are logged.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        self.close();
        let mut first_error = None;
        while let Some(res) = self.tasks.join_next().await {
            let res = res.unwrap_or_else(|e| Err(anyhow::anyhow!("loop task of {} panicked: {e}", self.id)));
            if let Err(e) = res {
                log::error!("Error in a loop task of {}: {e:#}", self.id);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn require_direction(&self, required: Direction) -> Result<(), ChannelError> {
        if self.direction != required {
            return Err(ChannelError::WrongDirection {
                id: self.id.clone(),
                required,
                actual: self.direction,
            });
        }
        Ok(())
    }

    fn take_link(&mut self) -> Result<Box<dyn TransportLink>, ChannelError> {
        let link = self.link.take().ok_or(ChannelError::NotOpen { id: self.id.clone() })?;
        self.state = State::Running;
        Ok(link)
    }
}
