//! `matrix-core`
//!
//! Core trait definitions and types for the matrix-bridge device abstraction.
//!
//! This crate provides the framework-facing building blocks shared by the
//! vendor driver crates: capability traits, the driver factory / plugin API,
//! the device registry, the state-store collaborator, and the error taxonomy.
//!
//! ## Architecture
//!
//! - **Capability traits** ([`capabilities`]): small, single-purpose traits a
//!   driver implements for exactly the features its hardware supports
//!   (`InputController`, `EndpointHealth`).
//! - **Driver factories** ([`driver`]): TOML-configured factories that build a
//!   driver and hand back a [`driver::DeviceComponents`] capability bag.
//! - **Registry** ([`registry`]): maps device ids to their capability objects
//!   so host code can look devices up by what they can do.
//! - **State store** ([`store`]): the merge-patch ingest boundary through
//!   which drivers publish normalized device state to the host.

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod registry;
pub mod store;

pub use capabilities::{Connectivity, EndpointHealth, InputController};
pub use driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
pub use error::{MatrixError, Result};
pub use registry::{DeviceInfo, DeviceRegistry};
pub use store::{MemoryStateStore, StateStore};
