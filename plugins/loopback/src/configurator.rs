//! A perf-sensor style configurator for the loopback transport.

use std::sync::Arc;

use sensorlink::channel::converter::{IdentityConverter, TimestampConverter};
use sensorlink::channel::{Channel, ChannelId, Direction};
use sensorlink::config::{self, ConfigurationError};
use sensorlink::sensor::{Configurator, SensorContext, SensorId, SiteContext};

use crate::broker::LoopbackBroker;

pub const SEND_QUEUE: &str = "send_queue";
pub const RECV_QUEUE: &str = "recv_queue";
pub const SEND_INTERVAL: &str = "send_interval";
pub const FILE_NAME: &str = "file_name";

const QUEUE_NAME: &str = "queueName";
const GROUP: &str = "loopback";

/// Builds a sensor context with one OUT channel (`sender`, timestamped) and
/// one IN channel (`receiver`, identity) in the `loopback` transport group.
///
/// Required keys: `send_queue`, `recv_queue` (strings) and `send_interval`
/// (non-negative integer, milliseconds). `file_name` is optional.
pub struct LoopbackConfigurator {
    broker: LoopbackBroker,
}

impl LoopbackConfigurator {
    pub fn new(broker: &LoopbackBroker) -> Self {
        Self { broker: broker.clone() }
    }
}

impl Configurator for LoopbackConfigurator {
    fn configure(&self, _site: &SiteContext, conf: &toml::Table) -> Result<SensorContext, ConfigurationError> {
        let send_queue = config::require_str(conf, SEND_QUEUE, "")?;
        let recv_queue = config::require_str(conf, RECV_QUEUE, "")?;
        let interval = config::require_int(conf, SEND_INTERVAL, "")?;
        if interval < 0 {
            return Err(ConfigurationError::InvalidValue {
                path: SEND_INTERVAL.to_owned(),
                reason: format!("interval must be non-negative, got {interval}"),
            });
        }

        let mut context = SensorContext::new(SensorId::new("loopbackPerf", "general"));
        context.add_property(SEND_INTERVAL, toml::Value::Integer(interval));
        match conf.get(FILE_NAME) {
            None => (),
            Some(value) => match value.as_str() {
                Some(_) => context.add_property(FILE_NAME, value.clone()),
                None => return Err(ConfigurationError::bad_type(FILE_NAME.to_owned(), "string", value)),
            },
        }

        let mut send_props = toml::Table::new();
        send_props.insert(QUEUE_NAME.to_owned(), toml::Value::String(send_queue.clone()));
        let sender = Channel::new(
            ChannelId::new(GROUP, "sender"),
            Direction::Out,
            Box::new(self.broker.transport(&send_queue)),
            Arc::new(TimestampConverter),
            Channel::DEFAULT_CAPACITY,
        )
        .with_properties(send_props);

        let mut recv_props = toml::Table::new();
        recv_props.insert(QUEUE_NAME.to_owned(), toml::Value::String(recv_queue.clone()));
        let receiver = Channel::new(
            ChannelId::new(GROUP, "receiver"),
            Direction::In,
            Box::new(self.broker.transport(&recv_queue)),
            Arc::new(IdentityConverter),
            Channel::DEFAULT_CAPACITY,
        )
        .with_properties(recv_props);

        context.add_channel(GROUP, sender);
        context.add_channel(GROUP, receiver);
        Ok(context)
    }
}
