//! SENSORLINK: named, typed message channels over pluggable transports.
//!
//! Sensorlink lets a distributed sensor workload declare named, directional
//! message [channels](channel::Channel) over swappable message transports,
//! and assembles those channels, together with a declarative topology
//! description, into runnable processing-graph components (spouts and bolts)
//! for an external stream-processing engine.
//!
//! # This crate
//! This crate provides the transport-agnostic core:
//! 1. The [`Channel`](channel::Channel) abstraction and its send/receive
//!    execution model, backed by asynchronous **Tokio** tasks.
//! 2. The per-process [`SensorContext`](sensor::SensorContext) built by a
//!    [`Configurator`](sensor::Configurator) from a raw configuration map.
//! 3. The [`BuilderRegistry`](topology::registry::BuilderRegistry) and
//!    [`TopologyAssembler`](topology::TopologyAssembler), which turn a
//!    validated topology configuration into a named collection of
//!    [`StreamComponents`](topology::StreamComponents).
//!
//! The core does not speak any broker wire protocol by itself.
//! Concrete transports implement the [`Transport`](transport::Transport)
//! capability and register their component builders under a broker-type key.

pub mod channel;
pub mod config;
pub mod message;
pub mod sensor;
pub mod topology;
pub mod transport;
