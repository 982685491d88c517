//! Device registry for runtime device management.
//!
//! The registry is the host framework's entry point into the driver layer:
//! factories are registered at startup, devices are built from TOML config
//! sections, and capability accessors hand back the trait objects host code
//! works against.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = DeviceRegistry::new();
//! registry.register_factory(Box::new(AvlinkFactory::new(store)));
//!
//! registry.build_device("av_matrix", "avlink", config).await?;
//!
//! if let Some(controller) = registry.get_input_controller("av_matrix") {
//!     controller.select_input("01", "Apple TV").await?;
//! }
//! ```

use crate::capabilities::{EndpointHealth, InputController};
use crate::driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Unique identifier for a registered device.
///
/// Format: lowercase alphanumeric with underscores (e.g., "av_matrix").
pub type DeviceId = String;

/// Information about a registered device (returned by list operations)
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Unique identifier
    pub id: DeviceId,
    /// Driver type name (e.g., "avlink")
    pub driver_type: String,
    /// Capabilities this device supports
    pub capabilities: Vec<Capability>,
    /// Capability-specific metadata
    pub metadata: DeviceMetadata,
}

/// A registered device with its capability objects and metadata
struct RegisteredDevice {
    driver_type: String,
    components: DeviceComponents,
}

/// Central registry for device management.
///
/// Owns the driver factories and the devices built from them. Devices are
/// looked up by id and accessed through their capability trait objects.
#[derive(Default)]
pub struct DeviceRegistry {
    /// Driver factories by driver type name
    factories: HashMap<&'static str, Box<dyn DriverFactory>>,

    /// Registered devices by ID
    devices: HashMap<DeviceId, RegisteredDevice>,
}

impl DeviceRegistry {
    /// Create a new empty device registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver factory.
    ///
    /// Replaces any previously registered factory for the same driver type.
    pub fn register_factory(&mut self, factory: Box<dyn DriverFactory>) {
        tracing::debug!(driver_type = factory.driver_type(), "registering factory");
        self.factories.insert(factory.driver_type(), factory);
    }

    /// List the driver types of all registered factories
    pub fn factory_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build and register a device from configuration.
    ///
    /// Validates the configuration against the factory first, then builds the
    /// driver and stores its capability objects under `id`.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the device id is already registered
    /// - no factory is registered for `driver_type`
    /// - configuration validation fails
    /// - the driver fails to initialize (e.g. the device is unreachable)
    pub async fn build_device(
        &mut self,
        id: &str,
        driver_type: &str,
        config: toml::Value,
    ) -> Result<()> {
        if self.devices.contains_key(id) {
            return Err(anyhow!("device '{}' is already registered", id));
        }

        let factory = self
            .factories
            .get(driver_type)
            .ok_or_else(|| anyhow!("no factory registered for driver type '{}'", driver_type))?;

        factory.validate(&config).map_err(|e| {
            anyhow!(
                "configuration validation failed for device '{}' ({}): {}",
                id,
                driver_type,
                e
            )
        })?;

        let components = factory.build(config).await?;
        tracing::info!(
            device_id = id,
            driver_type,
            capabilities = ?components.capabilities(),
            "device registered"
        );

        self.devices.insert(
            id.to_string(),
            RegisteredDevice {
                driver_type: driver_type.to_string(),
                components,
            },
        );
        Ok(())
    }

    /// Unregister a device.
    ///
    /// Returns true if the device was found and removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.devices.remove(id).is_some()
    }

    /// List all registered devices
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .map(|(id, d)| DeviceInfo {
                id: id.clone(),
                driver_type: d.driver_type.clone(),
                capabilities: d.components.capabilities(),
                metadata: d.components.metadata.clone(),
            })
            .collect()
    }

    /// Check if a device is registered
    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Get count of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // =========================================================================
    // Capability Access
    // =========================================================================

    /// Get a device as InputController (if it supports this capability)
    pub fn get_input_controller(&self, id: &str) -> Option<Arc<dyn InputController>> {
        self.devices
            .get(id)
            .and_then(|d| d.components.input_controller.clone())
    }

    /// Get a device as EndpointHealth (if it supports this capability)
    pub fn get_endpoint_health(&self, id: &str) -> Option<Arc<dyn EndpointHealth>> {
        self.devices
            .get(id)
            .and_then(|d| d.components.endpoint_health.clone())
    }

    /// Get all devices that support a specific capability
    pub fn devices_with_capability(&self, capability: Capability) -> Vec<DeviceId> {
        self.devices
            .iter()
            .filter(|(_, d)| d.components.capabilities().contains(&capability))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Connectivity;
    use async_trait::async_trait;
    use futures::future::BoxFuture;

    struct FixedHealth(Connectivity);

    impl EndpointHealth for FixedHealth {
        fn connectivity(&self) -> Connectivity {
            self.0
        }
    }

    struct NullController;

    #[async_trait]
    impl InputController for NullController {
        async fn select_input(&self, _endpoint_id: &str, _input_name: &str) -> Result<()> {
            Ok(())
        }

        async fn selected_input(&self, _endpoint_id: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn available_inputs(&self) -> Vec<String> {
            vec!["HDMI 1".into()]
        }
    }

    struct StubFactory;

    impl DriverFactory for StubFactory {
        fn driver_type(&self) -> &'static str {
            "stub"
        }

        fn name(&self) -> &'static str {
            "Stub Device"
        }

        fn capabilities(&self) -> &'static [Capability] {
            &[Capability::InputController, Capability::EndpointHealth]
        }

        fn validate(&self, config: &toml::Value) -> Result<()> {
            config
                .get("address")
                .and_then(|v| v.as_str())
                .filter(|a| !a.is_empty())
                .ok_or_else(|| anyhow!("missing 'address' field"))?;
            Ok(())
        }

        fn build(&self, _config: toml::Value) -> BoxFuture<'static, Result<DeviceComponents>> {
            Box::pin(async {
                Ok(DeviceComponents::new()
                    .with_input_controller(Arc::new(NullController))
                    .with_endpoint_health(Arc::new(FixedHealth(Connectivity::Ok))))
            })
        }
    }

    fn stub_config() -> toml::Value {
        toml::Value::Table(toml::toml! {
            address = "10.0.0.20"
        })
    }

    #[tokio::test]
    async fn build_and_look_up_device() {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(StubFactory));

        registry
            .build_device("switch", "stub", stub_config())
            .await
            .unwrap();

        assert!(registry.contains("switch"));
        assert_eq!(registry.len(), 1);

        let controller = registry.get_input_controller("switch").unwrap();
        assert_eq!(controller.available_inputs(), vec!["HDMI 1".to_string()]);

        let health = registry.get_endpoint_health("switch").unwrap();
        assert_eq!(health.connectivity(), Connectivity::Ok);
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(StubFactory));

        registry
            .build_device("switch", "stub", stub_config())
            .await
            .unwrap();

        let result = registry.build_device("switch", "stub", stub_config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_driver_type_fails() {
        let mut registry = DeviceRegistry::new();

        let result = registry.build_device("switch", "stub", stub_config()).await;
        assert!(result.unwrap_err().to_string().contains("no factory"));
    }

    #[tokio::test]
    async fn invalid_config_rejected_before_build() {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(StubFactory));

        let result = registry
            .build_device("switch", "stub", toml::Value::Table(toml::map::Map::new()))
            .await;

        let message = result.unwrap_err().to_string();
        assert!(message.contains("validation failed"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn list_devices_reports_capabilities() {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(StubFactory));
        registry
            .build_device("switch", "stub", stub_config())
            .await
            .unwrap();

        let devices = registry.list_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].driver_type, "stub");
        assert!(devices[0]
            .capabilities
            .contains(&Capability::InputController));

        let routed = registry.devices_with_capability(Capability::InputController);
        assert_eq!(routed, vec!["switch".to_string()]);
    }

    #[tokio::test]
    async fn unregister_removes_device() {
        let mut registry = DeviceRegistry::new();
        registry.register_factory(Box::new(StubFactory));
        registry
            .build_device("switch", "stub", stub_config())
            .await
            .unwrap();

        assert!(registry.unregister("switch"));
        assert!(!registry.contains("switch"));
        assert!(!registry.unregister("switch"));
    }
}
