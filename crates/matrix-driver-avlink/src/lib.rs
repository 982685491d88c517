//! AVLink HDMI/AV Matrix Switch Driver
//!
//! This crate provides a driver for AVLink-protocol HDMI matrix switches
//! controlled over a line-based ASCII protocol on a persistent TCP connection.
//!
//! # Communication
//!
//! Commands are fixed-format 12-byte frames (`MT00<OP><P1><P2>NT`); the switch
//! answers with status frames (`LINK<rec>[;<rec>...];END`) that report which
//! input is routed to each output. Replies carry no request ids, so a single
//! connection multiplexes fire-and-forget commands against an ambiguous
//! response stream: the driver serializes writes through a FIFO queue with a
//! mandatory pacing gap and correlates confirmations by arrival order.
//!
//! # Capabilities
//!
//! - `InputController` - route a named input to an output endpoint
//! - `EndpointHealth` - report link reachability
//!
//! # Usage
//!
//! ```rust,ignore
//! use matrix_driver_avlink::AvlinkFactory;
//! use matrix_core::DriverFactory;
//!
//! // Register the factory
//! registry.register_factory(Box::new(AvlinkFactory::new(store)));
//!
//! // Create via config
//! let config = toml::toml! {
//!     address = "192.168.0.29"
//!     port = 5000
//!
//!     [outputs]
//!     "01" = "Living"
//!
//!     [inputs]
//!     "02" = "Apple TV"
//! };
//! let components = factory.build(config.into()).await?;
//! ```
//!
//! # Testing
//!
//! The [`testing`] module ships a scriptable mock switch over an in-memory
//! duplex stream for integration tests without hardware.

pub mod driver;
pub mod ingest;
pub mod link;
pub mod protocol;
pub mod testing;

pub use driver::{AvlinkDriver, AvlinkFactory, MatrixConfig};
pub use ingest::{PortMapping, StatusIngestor};
pub use link::{Confirmation, ConnectionState, LinkOptions, MatrixLink};
pub use protocol::{StatusRecord, StatusReply};
