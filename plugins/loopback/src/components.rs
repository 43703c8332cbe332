//! Loopback spouts and bolts.

use std::fmt;

use anyhow::{anyhow, Context};
use tokio::runtime;
use tokio::sync::mpsc;

use sensorlink::channel::converter;
use sensorlink::channel::error::{ConsumeError, ConsumeRetry};
use sensorlink::channel::send::Outbound;
use sensorlink::channel::{Channel, ChannelId, Direction};
use sensorlink::config;
use sensorlink::message::SensorMessage;
use sensorlink::topology::registry::{Bolt, BoltBuilder, BuildRequest, Spout, SpoutBuilder};

use crate::broker::LoopbackBroker;

/// Name of the queue on the broker. Required node property.
const QUEUE_NAME: &str = "queueName";

fn queue_name(req: &BuildRequest) -> anyhow::Result<String> {
    let properties = req
        .properties
        .ok_or_else(|| anyhow!("node for channel '{}' declares no properties, '{QUEUE_NAME}' is required", req.channel))?;
    Ok(config::require_str(properties, QUEUE_NAME, "properties")?)
}

fn channel(broker: &LoopbackBroker, req: &BuildRequest, direction: Direction) -> anyhow::Result<Channel> {
    let queue = queue_name(req)?;
    let converter = converter::by_key(req.message_builder)
        .ok_or_else(|| anyhow!("unknown message builder key '{}'", req.message_builder))?;
    let mut properties = toml::Table::new();
    properties.insert(QUEUE_NAME.to_owned(), toml::Value::String(queue.clone()));
    Ok(Channel::new(
        ChannelId::new(crate::BROKER_TYPE, req.channel),
        direction,
        Box::new(broker.transport(&queue)),
        converter,
        Channel::DEFAULT_CAPACITY,
    )
    .with_properties(properties))
}

/// A source node reading one loopback queue.
///
/// Once open, decoded messages are buffered for the host engine; drain them
/// with [`take_output`](LoopbackSpout::take_output).
pub struct LoopbackSpout {
    channel: Channel,
    fields: Vec<String>,
    output: Option<mpsc::Receiver<SensorMessage>>,
}

impl LoopbackSpout {
    pub fn build(broker: &LoopbackBroker, req: &BuildRequest) -> anyhow::Result<Self> {
        Ok(Self {
            channel: channel(broker, req, Direction::In)?,
            fields: req.fields.to_vec(),
            output: None,
        })
    }

    /// Takes the receiving half of the spout's output. `None` before `open`
    /// or if already taken.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<SensorMessage>> {
        self.output.take()
    }
}

impl fmt::Debug for LoopbackSpout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackSpout")
            .field("channel", self.channel.id())
            .field("fields", &self.fields)
            .finish()
    }
}

impl Spout for LoopbackSpout {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn open(&mut self, rt: &runtime::Handle) -> anyhow::Result<()> {
        let id = self.channel.id().clone();
        self.channel
            .open()
            .with_context(|| format!("failed to open spout channel {id}"))?;

        let (tx, rx) = mpsc::channel(self.channel.capacity());
        self.output = Some(rx);
        // The host engine is expected to drain the output; a full buffer
        // only loses the offending message.
        let feed = move |msg: SensorMessage| -> Result<(), ConsumeError> { tx.try_send(msg).retry_consume() };
        self.channel.start_receive_loop(Box::new(feed), rt)?;
        Ok(())
    }

    fn close(&mut self) {
        self.channel.close();
    }
}

/// A sink node writing one loopback queue.
pub struct LoopbackBolt {
    channel: Channel,
    outbound: Option<Outbound>,
}

impl LoopbackBolt {
    pub fn build(broker: &LoopbackBroker, req: &BuildRequest) -> anyhow::Result<Self> {
        Ok(Self {
            channel: channel(broker, req, Direction::Out)?,
            outbound: None,
        })
    }

    /// Emits one message on the bolt's channel.
    ///
    /// Waits when the outbound queue is full (backpressure).
    pub async fn emit(&self, msg: &SensorMessage) -> anyhow::Result<()> {
        let outbound = self.outbound.as_ref().ok_or_else(|| anyhow!("bolt is not open"))?;
        outbound.enqueue(msg).await?;
        Ok(())
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Bolt for LoopbackBolt {
    fn open(&mut self, rt: &runtime::Handle) -> anyhow::Result<()> {
        let id = self.channel.id().clone();
        self.channel
            .open()
            .with_context(|| format!("failed to open bolt channel {id}"))?;
        self.outbound = Some(self.channel.outbound(rt)?);
        Ok(())
    }

    fn close(&mut self) {
        self.channel.close();
    }
}

/// Builds [`LoopbackSpout`]s.
pub struct LoopbackSpoutBuilder {
    broker: LoopbackBroker,
}

impl LoopbackSpoutBuilder {
    pub fn new(broker: &LoopbackBroker) -> Self {
        Self { broker: broker.clone() }
    }
}

impl SpoutBuilder for LoopbackSpoutBuilder {
    fn build_spout(&self, req: &BuildRequest) -> anyhow::Result<Box<dyn Spout>> {
        Ok(Box::new(LoopbackSpout::build(&self.broker, req)?))
    }
}

/// Builds [`LoopbackBolt`]s.
pub struct LoopbackBoltBuilder {
    broker: LoopbackBroker,
}

impl LoopbackBoltBuilder {
    pub fn new(broker: &LoopbackBroker) -> Self {
        Self { broker: broker.clone() }
    }
}

impl BoltBuilder for LoopbackBoltBuilder {
    fn build_bolt(&self, req: &BuildRequest) -> anyhow::Result<Box<dyn Bolt>> {
        Ok(Box::new(LoopbackBolt::build(&self.broker, req)?))
    }
}
