//! Driver factory and component types.
//!
//! This module provides the plugin API for registered drivers. Drivers
//! implement [`DriverFactory`] and are registered with the
//! [`crate::registry::DeviceRegistry`] at startup via explicit
//! `registry.register_factory(factory)` calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                Composition Root (host process)           │
//! │  registry.register_factory(Box::new(AvlinkFactory));     │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      DeviceRegistry                      │
//! │  factories: HashMap<driver_type, Box<dyn DriverFactory>> │
//! │  devices: HashMap<device_id, DeviceComponents>           │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  DriverFactory::build()                  │
//! │  Parses TOML config, connects, returns capabilities      │
//! └──────────────────────────────────────────────────────────┘
//! ```

use crate::capabilities::{EndpointHealth, InputController};
use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Capability Enum (Runtime Introspection)
// =============================================================================

/// Runtime capability flags for device introspection.
///
/// Mirrors the capability traits as an enum so callers can list or match on
/// what a device supports without checking each trait object individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can route inputs to output endpoints.
    /// Corresponds to [`crate::capabilities::InputController`]
    InputController,

    /// Reports endpoint reachability.
    /// Corresponds to [`crate::capabilities::EndpointHealth`]
    EndpointHealth,
}

impl Capability {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::InputController => "Input Controller",
            Self::EndpointHealth => "Endpoint Health",
        }
    }
}

// =============================================================================
// Device Components (Capability Bag)
// =============================================================================

/// Container for capability trait objects returned by drivers.
///
/// When a driver is instantiated, it returns a `DeviceComponents` struct
/// containing the capabilities it implements. The registry uses these to
/// populate its internal maps for capability-based lookups.
///
/// Each capability is stored as its own `Arc` rather than one `Arc<dyn
/// Driver>`: no runtime downcasting, and drivers may back different
/// capabilities with different objects.
#[derive(Default)]
pub struct DeviceComponents {
    /// InputController implementation (input routing)
    pub input_controller: Option<Arc<dyn InputController>>,

    /// EndpointHealth implementation (reachability reporting)
    pub endpoint_health: Option<Arc<dyn EndpointHealth>>,

    /// Capability-specific metadata (port counts, names)
    pub metadata: DeviceMetadata,
}

impl DeviceComponents {
    /// Create a new empty DeviceComponents
    pub fn new() -> Self {
        Self::default()
    }

    /// Get list of capabilities this device supports
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();

        if self.input_controller.is_some() {
            caps.push(Capability::InputController);
        }
        if self.endpoint_health.is_some() {
            caps.push(Capability::EndpointHealth);
        }

        caps
    }

    /// Set InputController implementation
    pub fn with_input_controller(mut self, c: Arc<dyn InputController>) -> Self {
        self.input_controller = Some(c);
        self
    }

    /// Set EndpointHealth implementation
    pub fn with_endpoint_health(mut self, h: Arc<dyn EndpointHealth>) -> Self {
        self.endpoint_health = Some(h);
        self
    }

    /// Set device metadata
    pub fn with_metadata(mut self, metadata: DeviceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// Device Metadata
// =============================================================================

/// Capability-specific metadata for a device.
///
/// Holds information about a device that isn't captured in the trait objects
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct DeviceMetadata {
    /// For routing devices: number of physical output endpoints
    pub output_count: Option<u8>,

    /// For routing devices: display names of the selectable inputs
    pub input_names: Vec<String>,
}

// =============================================================================
// Driver Factory Trait
// =============================================================================

/// Trait for driver factories that create device instances.
///
/// Each driver crate implements this trait to register itself with the
/// DeviceRegistry. The factory is responsible for:
///
/// 1. Declaring what driver type it handles (matching the TOML `type` field)
/// 2. Validating configuration before instantiation
/// 3. Asynchronously creating the driver and returning capabilities
///
/// Factories are registered once at startup and live for the program's
/// lifetime, so they must be `Send + Sync + 'static`. `build()` takes `&self`
/// and returns a `BoxFuture<'static, ...>`; factories must not hold mutable
/// state across builds.
pub trait DriverFactory: Send + Sync + 'static {
    /// Driver type name used in the TOML config `type` field.
    fn driver_type(&self) -> &'static str;

    /// Human-readable name for documentation and error messages.
    fn name(&self) -> &'static str;

    /// List of capabilities this driver type provides.
    ///
    /// Used for introspection and documentation. The actual capabilities are
    /// determined by what `build()` returns.
    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Validate configuration without instantiating.
    ///
    /// Called before `build()` to provide early error feedback. Should check
    /// that all required fields exist and have valid types.
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Async instantiation of the driver.
    ///
    /// Called after validation passes. Parses the configuration, opens the
    /// device connection, and returns `DeviceComponents` with all implemented
    /// capabilities.
    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names() {
        assert_eq!(Capability::InputController.name(), "Input Controller");
        assert_eq!(Capability::EndpointHealth.name(), "Endpoint Health");
    }

    #[test]
    fn capability_serde() {
        let json = serde_json::to_string(&Capability::InputController).unwrap();
        assert_eq!(json, "\"input_controller\"");

        let cap: Capability = serde_json::from_str("\"endpoint_health\"").unwrap();
        assert_eq!(cap, Capability::EndpointHealth);
    }

    #[test]
    fn empty_components_have_no_capabilities() {
        let components = DeviceComponents::new();
        assert!(components.capabilities().is_empty());
    }

    #[test]
    fn components_metadata_builder() {
        let components = DeviceComponents::new().with_metadata(DeviceMetadata {
            output_count: Some(8),
            input_names: vec!["Apple TV".into(), "Cable".into()],
        });

        assert_eq!(components.metadata.output_count, Some(8));
        assert_eq!(components.metadata.input_names.len(), 2);
    }
}
