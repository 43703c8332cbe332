//! Topology assembly: from a declarative configuration to runnable
//! processing-graph components.
//!
//! The [`TopologyAssembler`] reads the full topology configuration,
//! validates each node entry strictly, resolves the node's broker-type key
//! against a [`BuilderRegistry`](registry::BuilderRegistry), and accumulates
//! the built nodes into a named [`StreamComponents`] collection handed to
//! the host engine.
//!
//! Assembly is all-or-nothing: the first invalid node, unknown broker key or
//! builder failure aborts the whole build, and no components are returned.

pub mod node;
pub mod registry;

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::config::{self, ConfigurationError};

use node::NodeSpec;
use registry::{Bolt, BuildRequest, BuilderRegistry, Spout, UnknownBrokerError};

const SPOUTS: &str = "spouts";
const BOLTS: &str = "bolts";
const COORDINATION: &str = "coordination";
const CONNECT: &str = "connect";

/// Error raised during topology assembly. Always fatal for the whole build.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    UnknownBroker(#[from] UnknownBrokerError),
    #[error("builder failed for node '{node}'")]
    Build {
        node: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The assembled processing-graph nodes, keyed by node name.
///
/// Append-only during assembly, read-only for the host engine.
/// Iteration follows the declaration order of the configuration.
pub struct StreamComponents {
    spouts: IndexMap<String, Box<dyn Spout>>,
    bolts: IndexMap<String, Box<dyn Bolt>>,
}

impl StreamComponents {
    pub fn new() -> Self {
        Self {
            spouts: IndexMap::new(),
            bolts: IndexMap::new(),
        }
    }

    pub fn add_spout<N: Into<String>>(&mut self, name: N, spout: Box<dyn Spout>) {
        self.spouts.insert(name.into(), spout);
    }

    pub fn add_bolt<N: Into<String>>(&mut self, name: N, bolt: Box<dyn Bolt>) {
        self.bolts.insert(name.into(), bolt);
    }

    pub fn spout(&self, name: &str) -> Option<&dyn Spout> {
        self.spouts.get(name).map(|s| s.as_ref())
    }

    pub fn spout_mut(&mut self, name: &str) -> Option<&mut Box<dyn Spout>> {
        self.spouts.get_mut(name)
    }

    pub fn bolt(&self, name: &str) -> Option<&dyn Bolt> {
        self.bolts.get(name).map(|b| b.as_ref())
    }

    pub fn bolt_mut(&mut self, name: &str) -> Option<&mut Box<dyn Bolt>> {
        self.bolts.get_mut(name)
    }

    /// Spout names, in declaration order.
    pub fn spout_names(&self) -> impl Iterator<Item = &str> {
        self.spouts.keys().map(String::as_str)
    }

    /// Bolt names, in declaration order.
    pub fn bolt_names(&self) -> impl Iterator<Item = &str> {
        self.bolts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.spouts.len() + self.bolts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spouts.is_empty() && self.bolts.is_empty()
    }
}

impl Default for StreamComponents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamComponents")
            .field("spouts", &self.spouts.keys().collect::<Vec<_>>())
            .field("bolts", &self.bolts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds the components of a topology from its declarative configuration.
///
/// The builder registry is an explicit parameter, so tests (and multi-tenant
/// processes) stay hermetic.
pub struct TopologyAssembler<'r> {
    registry: &'r BuilderRegistry,
}

impl<'r> TopologyAssembler<'r> {
    pub fn new(registry: &'r BuilderRegistry) -> Self {
        Self { registry }
    }

    /// Validates the whole topology configuration and builds its components.
    ///
    /// Recognized sections: `spouts` and `bolts` (node entries, built in
    /// declaration order) and `coordination.connect` (the connection string
    /// of the shared coordination service, required).
    pub fn assemble(&self, conf: &toml::Table) -> Result<StreamComponents, AssemblyError> {
        let coordination = config::require_str(config::require_table(conf, COORDINATION, "")?, CONNECT, COORDINATION)?;

        let mut components = StreamComponents::new();

        if let Some(spouts) = config::optional_table(conf, SPOUTS, "")? {
            for (name, entry) in spouts {
                let scope = format!("{SPOUTS}.{name}");
                let spec = NodeSpec::parse(name, entry, &scope)?;
                let builder = self.registry.spout_builder(&spec.broker)?;
                let spout = builder
                    .build_spout(&build_request(&spec, &coordination))
                    .map_err(|e| AssemblyError::Build {
                        node: name.clone(),
                        source: e,
                    })?;
                log::debug!("Built spout '{name}' for broker type '{}'", spec.broker);
                components.add_spout(name.clone(), spout);
            }
        }

        if let Some(bolts) = config::optional_table(conf, BOLTS, "")? {
            for (name, entry) in bolts {
                let scope = format!("{BOLTS}.{name}");
                let spec = NodeSpec::parse(name, entry, &scope)?;
                let builder = self.registry.bolt_builder(&spec.broker)?;
                let bolt = builder
                    .build_bolt(&build_request(&spec, &coordination))
                    .map_err(|e| AssemblyError::Build {
                        node: name.clone(),
                        source: e,
                    })?;
                log::debug!("Built bolt '{name}' for broker type '{}'", spec.broker);
                components.add_bolt(name.clone(), bolt);
            }
        }

        Ok(components)
    }
}

fn build_request<'a>(spec: &'a NodeSpec, coordination: &'a str) -> BuildRequest<'a> {
    BuildRequest {
        sensor: &spec.sensor,
        channel: &spec.channel,
        fields: &spec.fields,
        message_builder: &spec.builder,
        properties: spec.properties.as_ref(),
        coordination,
    }
}
