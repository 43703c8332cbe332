//! Per-process sensor runtime state and its construction.
//!
//! A [`SensorContext`] holds the identity, the property bag and the channel
//! registry of a running sensor. It is built exactly once, single-threaded,
//! by a [`Configurator`] at startup; after that it is read-only and can be
//! shared safely by all channel loops, until it is destroyed (all channels
//! closed) on shutdown.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::channel::{Channel, ChannelId};
use crate::config::ConfigurationError;

/// Identifies a running sensor instance.
///
/// Used for logging and correlation, not for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorId {
    name: String,
    group: String,
}

impl SensorId {
    pub fn new<N: Into<String>, G: Into<String>>(name: N, group: G) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// Site metadata available to configurators.
///
/// The core assumes it runs inside an already launched process; how the
/// process was deployed on the site is not its concern.
pub struct SiteContext {
    site: String,
    properties: toml::Table,
}

impl SiteContext {
    pub fn new<S: Into<String>>(site: S) -> Self {
        Self {
            site: site.into(),
            properties: toml::Table::new(),
        }
    }

    pub fn with_properties(mut self, properties: toml::Table) -> Self {
        self.properties = properties;
        self
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn property(&self, key: &str) -> Option<&toml::Value> {
        self.properties.get(key)
    }
}

/// The runtime state of one sensor: identity, properties, and the channels
/// grouped by transport group name.
///
/// A single group may hold several channels, typically one OUT and one IN.
pub struct SensorContext {
    id: SensorId,
    properties: toml::Table,
    channels_by_group: FxHashMap<String, Vec<Channel>>,
}

impl SensorContext {
    pub fn new(id: SensorId) -> Self {
        Self {
            id,
            properties: toml::Table::new(),
            channels_by_group: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &SensorId {
        &self.id
    }

    pub fn add_property<K: Into<String>>(&mut self, key: K, value: toml::Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<&toml::Value> {
        self.properties.get(key)
    }

    /// Registers a channel under its transport group.
    pub fn add_channel<G: Into<String>>(&mut self, group: G, channel: Channel) {
        self.channels_by_group.entry(group.into()).or_default().push(channel);
    }

    pub fn channel(&self, group: &str, name: &str) -> Option<&Channel> {
        self.channels_by_group
            .get(group)?
            .iter()
            .find(|c| c.id().name() == name)
    }

    pub fn channel_mut(&mut self, group: &str, name: &str) -> Option<&mut Channel> {
        self.channels_by_group
            .get_mut(group)?
            .iter_mut()
            .find(|c| c.id().name() == name)
    }

    /// Iterates over all registered channels, in no particular group order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels_by_group.values().flatten()
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels().map(|c| c.id().clone()).collect()
    }

    /// Closes every channel. Idempotent, like [`Channel::close`].
    pub fn close_all(&mut self) {
        for channels in self.channels_by_group.values_mut() {
            for channel in channels {
                channel.close();
            }
        }
    }
}

impl fmt::Debug for SensorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorContext")
            .field("id", &self.id)
            .field("properties", &self.properties)
            .field("channels", &self.channel_ids())
            .finish()
    }
}

/// Builds a [`SensorContext`] (with its channels) from a raw configuration
/// map and site metadata.
///
/// Validation is strict: each missing or mistyped required property fails
/// fast with a [`ConfigurationError`] naming the key, and no partial context
/// is returned on failure.
pub trait Configurator {
    fn configure(&self, site: &SiteContext, config: &toml::Table) -> Result<SensorContext, ConfigurationError>;
}
