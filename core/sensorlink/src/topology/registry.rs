//! The component builder registry: broker-type key -> builder.
//!
//! The registry is an explicit value, built once at process startup and
//! passed by reference to the [assembler](super::TopologyAssembler); there
//! is no process-wide table. After registration it is immutable and can be
//! read concurrently.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// No builder is registered for a declared broker-type key.
/// Fatal: aborts the whole topology assembly.
#[derive(Error, Debug)]
#[error("cannot build a {kind} of broker type '{broker}': no builder registered for this key")]
pub struct UnknownBrokerError {
    pub broker: String,
    /// `"spout"` or `"bolt"`.
    pub kind: &'static str,
}

/// Everything a component builder receives to build one node.
pub struct BuildRequest<'a> {
    /// The declared sensor name.
    pub sensor: &'a str,
    /// The declared channel name.
    pub channel: &'a str,
    /// The declared tuple field names.
    pub fields: &'a [String],
    /// The message-builder key (selects the converter).
    pub message_builder: &'a str,
    /// The node's property subset, if declared.
    pub properties: Option<&'a toml::Table>,
    /// Connection string of the shared coordination service.
    /// Opaque to the core.
    pub coordination: &'a str,
}

/// A source-type processing-graph node, wired to an IN channel.
///
/// The host engine's scheduling and acking semantics are out of scope: the
/// handle only guarantees that once `open` succeeds it is ready to run.
pub trait Spout: Send {
    /// The tuple fields this spout declares to the host engine.
    fn fields(&self) -> &[String];

    /// Opens the underlying channel and starts receiving.
    fn open(&mut self, rt: &tokio::runtime::Handle) -> anyhow::Result<()>;

    /// Stops receiving and releases the underlying channel. Idempotent.
    fn close(&mut self);
}

/// A sink-type processing-graph node, wired to an OUT channel.
pub trait Bolt: Send {
    /// Opens the underlying channel and makes the node ready to emit.
    fn open(&mut self, rt: &tokio::runtime::Handle) -> anyhow::Result<()>;

    /// Releases the underlying channel. Idempotent.
    fn close(&mut self);
}

/// Builds spouts for one broker type.
pub trait SpoutBuilder: Send + Sync {
    fn build_spout(&self, req: &BuildRequest) -> anyhow::Result<Box<dyn Spout>>;
}

/// Builds bolts for one broker type.
pub trait BoltBuilder: Send + Sync {
    fn build_bolt(&self, req: &BuildRequest) -> anyhow::Result<Box<dyn Bolt>>;
}

/// Maps broker-type keys to component builders.
pub struct BuilderRegistry {
    spouts: FxHashMap<String, Box<dyn SpoutBuilder>>,
    bolts: FxHashMap<String, Box<dyn BoltBuilder>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self {
            spouts: FxHashMap::default(),
            bolts: FxHashMap::default(),
        }
    }

    /// Registers a spout builder under a broker-type key.
    /// A second registration under the same key replaces the first.
    pub fn register_spout<K: Into<String>>(&mut self, broker: K, builder: Box<dyn SpoutBuilder>) {
        self.spouts.insert(broker.into(), builder);
    }

    pub fn register_bolt<K: Into<String>>(&mut self, broker: K, builder: Box<dyn BoltBuilder>) {
        self.bolts.insert(broker.into(), builder);
    }

    pub fn spout_builder(&self, broker: &str) -> Result<&dyn SpoutBuilder, UnknownBrokerError> {
        self.spouts
            .get(broker)
            .map(|b| b.as_ref())
            .ok_or_else(|| UnknownBrokerError {
                broker: broker.to_owned(),
                kind: "spout",
            })
    }

    pub fn bolt_builder(&self, broker: &str) -> Result<&dyn BoltBuilder, UnknownBrokerError> {
        self.bolts
            .get(broker)
            .map(|b| b.as_ref())
            .ok_or_else(|| UnknownBrokerError {
                broker: broker.to_owned(),
                kind: "bolt",
            })
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
