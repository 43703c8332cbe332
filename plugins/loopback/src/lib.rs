//! In-process loopback transport for sensorlink.
//!
//! A [`LoopbackBroker`] hosts named in-memory queues inside the current
//! process. It is the reference implementation of the
//! [`Transport`](sensorlink::transport::Transport) capability: useful for
//! wiring two channels of the same process together, and for exercising
//! topologies end-to-end without a real broker.
//!
//! The component builders are registered under the broker-type key
//! [`BROKER_TYPE`] (`"loopback"`).

mod broker;
mod components;
mod configurator;

pub use broker::{LoopbackBroker, LoopbackTransport};
pub use components::{LoopbackBolt, LoopbackBoltBuilder, LoopbackSpout, LoopbackSpoutBuilder};
pub use configurator::LoopbackConfigurator;

use sensorlink::topology::registry::BuilderRegistry;

/// The broker-type key under which [`register`] installs the builders.
pub const BROKER_TYPE: &str = "loopback";

/// Registers the loopback spout and bolt builders.
///
/// Call this before assembly runs, on the registry that will be passed to
/// the topology assembler.
pub fn register(registry: &mut BuilderRegistry, broker: &LoopbackBroker) {
    registry.register_spout(BROKER_TYPE, Box::new(LoopbackSpoutBuilder::new(broker)));
    registry.register_bolt(BROKER_TYPE, Box::new(LoopbackBoltBuilder::new(broker)));
}
