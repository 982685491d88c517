//! AVLink matrix switch driver facade.
//!
//! [`AvlinkDriver`] wires the codec, the TCP link task, and the status
//! ingestor together, and exposes the three mutating operations the host
//! framework needs: route an output, toggle the key beep, and request a
//! status refresh. [`AvlinkFactory`] plugs the driver into the
//! [`matrix_core::registry::DeviceRegistry`].
//!
//! Mutating operations are tracked: the caller may attach an opaque tracking
//! token, and the operation resolves once a status reply confirms it (or the
//! confirmation timeout fires). Right after the link is established the
//! driver issues a status query so current switch state is known before any
//! command is sent.

use crate::ingest::{PortMapping, StatusIngestor};
use crate::link::{Confirmation, ConnectionState, LinkOptions, MatrixLink, DEFAULT_PORT};
use crate::protocol;
use anyhow::Context;
use async_trait::async_trait;
use futures::future::BoxFuture;
use matrix_core::capabilities::{Connectivity, EndpointHealth, InputController};
use matrix_core::driver::{Capability, DeviceComponents, DeviceMetadata, DriverFactory};
use matrix_core::error::{MatrixError, Result};
use matrix_core::store::StateStore;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tracing::instrument;

/// Default confirmation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the AVLink driver.
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixConfig {
    /// Address of the switch's control interface. Mandatory.
    pub address: String,
    /// TCP port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Confirmation/connect timeout in seconds (default: 5)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Wire id to display name, for the switch's input ports
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    /// Wire id to display name, for the switch's output ports
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    /// Number of physical output ports on the switch
    #[serde(default)]
    pub output_count: Option<u8>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl MatrixConfig {
    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(MatrixError::Configuration(
                "missing mandatory field `address`".into(),
            ));
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

// =============================================================================
// AvlinkDriver
// =============================================================================

/// Driver facade for an AVLink HDMI matrix switch.
pub struct AvlinkDriver {
    link: MatrixLink,
    ingestor: Arc<StatusIngestor>,
    inputs: HashMap<String, String>,
    timeout: Duration,
}

impl AvlinkDriver {
    /// Dial the switch and bring the driver up.
    ///
    /// Issues an initial status query so the routing state is populated
    /// before the host sends any command.
    pub async fn connect(config: MatrixConfig, store: Arc<dyn StateStore>) -> Result<Self> {
        config.validate()?;
        let options = LinkOptions {
            connect_timeout: config.timeout(),
            ..LinkOptions::default()
        };
        let ingestor = Arc::new(StatusIngestor::new(
            config.outputs.clone(),
            config.inputs.clone(),
            store,
        ));
        let link =
            MatrixLink::connect(&config.address, config.port, options, ingestor.clone()).await?;
        Self::finish(config, link, ingestor)
    }

    /// Bring the driver up over an already-established stream.
    ///
    /// Same wiring as [`Self::connect`] minus the TCP dial; used by tests to
    /// run against a mock switch.
    pub fn attach<S>(config: MatrixConfig, stream: S, store: Arc<dyn StateStore>) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        config.validate()?;
        let ingestor = Arc::new(StatusIngestor::new(
            config.outputs.clone(),
            config.inputs.clone(),
            store,
        ));
        let link = MatrixLink::attach(stream, LinkOptions::default(), ingestor.clone());
        Self::finish(config, link, ingestor)
    }

    fn finish(
        config: MatrixConfig,
        link: MatrixLink,
        ingestor: Arc<StatusIngestor>,
    ) -> Result<Self> {
        let timeout = config.timeout();
        let driver = Self {
            link,
            ingestor,
            inputs: config.inputs,
            timeout,
        };
        driver.request_status()?;
        Ok(driver)
    }

    /// Route `input_id` to `output_id` and await the confirming status reply.
    ///
    /// A status query is chased after the switch command so the new routing
    /// is read back; the reply to that query resolves the tracking token.
    #[instrument(skip(self), err)]
    pub async fn set_output(
        &self,
        output_id: &str,
        input_id: &str,
        token: Option<String>,
    ) -> Result<Confirmation> {
        let output = parse_port_id(output_id)?;
        let input = parse_port_id(input_id)?;

        let confirmation = self
            .link
            .submit_tracked(protocol::encode_switch(input, output), token)?;
        self.link.submit(protocol::encode_status_query())?;
        self.await_confirmation(confirmation).await
    }

    /// Toggle the switch's key beep and await confirmation.
    #[instrument(skip(self), err)]
    pub async fn set_beep(&self, enabled: bool, token: Option<String>) -> Result<Confirmation> {
        let confirmation = self
            .link
            .submit_tracked(protocol::encode_buzzer(enabled), token)?;
        self.link.submit(protocol::encode_status_query())?;
        self.await_confirmation(confirmation).await
    }

    /// Queue a fire-and-forget status query.
    pub fn request_status(&self) -> Result<()> {
        self.link.submit(protocol::encode_status_query())
    }

    /// Route the input with the given display name to an output endpoint.
    ///
    /// Resolves the display name back to its wire id through the configured
    /// input table and delegates to [`Self::set_output`].
    #[instrument(skip(self), err)]
    pub async fn select_input_tracked(
        &self,
        endpoint_id: &str,
        input_name: &str,
        token: Option<String>,
    ) -> Result<Confirmation> {
        let input_id = self
            .inputs
            .iter()
            .find(|(_, name)| name.as_str() == input_name)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| MatrixError::UnknownPort(input_name.to_string()))?;
        self.set_output(endpoint_id, &input_id, token).await
    }

    /// Last observed mapping for an output, if any status mentioned it yet.
    pub fn mapping(&self, output_id: &str) -> Option<PortMapping> {
        self.ingestor.mapping(&wire_key(output_id))
    }

    /// Current link state.
    pub fn connection_state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Subscribe to link-state changes, e.g. to drive reconnect decisions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.link.subscribe()
    }

    async fn await_confirmation(
        &self,
        confirmation: oneshot::Receiver<Result<Confirmation>>,
    ) -> Result<Confirmation> {
        match tokio::time::timeout(self.timeout, confirmation).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MatrixError::LinkDown),
            Err(_) => Err(MatrixError::CorrelationTimeout),
        }
    }
}

/// Parse a caller-supplied port id ("1", "01", "12") into its numeric form.
fn parse_port_id(id: &str) -> Result<u8> {
    id.parse::<u8>()
        .map_err(|_| MatrixError::UnknownPort(id.to_string()))
}

/// Normalize a caller-supplied port id to the two-digit wire form.
fn wire_key(id: &str) -> String {
    match id.parse::<u8>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => id.to_string(),
    }
}

#[async_trait]
impl InputController for AvlinkDriver {
    async fn select_input(&self, endpoint_id: &str, input_name: &str) -> anyhow::Result<()> {
        self.select_input_tracked(endpoint_id, input_name, None)
            .await?;
        Ok(())
    }

    async fn selected_input(&self, endpoint_id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.mapping(endpoint_id).map(|m| m.input_name))
    }

    fn available_inputs(&self) -> Vec<String> {
        self.inputs.values().cloned().collect()
    }
}

impl EndpointHealth for AvlinkDriver {
    fn connectivity(&self) -> Connectivity {
        match self.link.state() {
            ConnectionState::Connected => Connectivity::Ok,
            ConnectionState::Connecting | ConnectionState::Disconnected => {
                Connectivity::Unreachable
            }
        }
    }
}

// =============================================================================
// AvlinkFactory - DriverFactory implementation
// =============================================================================

/// Factory for creating AVLink driver instances.
///
/// Holds the state-store collaborator the built drivers publish into;
/// constructed at the composition root and registered with the registry.
pub struct AvlinkFactory {
    store: Arc<dyn StateStore>,
}

impl AvlinkFactory {
    /// Create a factory publishing into the given state store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

/// Static capabilities for AVLink switches
static AVLINK_CAPABILITIES: &[Capability] =
    &[Capability::InputController, Capability::EndpointHealth];

impl DriverFactory for AvlinkFactory {
    fn driver_type(&self) -> &'static str {
        "avlink"
    }

    fn name(&self) -> &'static str {
        "AVLink HDMI Matrix Switch"
    }

    fn capabilities(&self) -> &'static [Capability] {
        AVLINK_CAPABILITIES
    }

    fn validate(&self, config: &toml::Value) -> anyhow::Result<()> {
        let cfg: MatrixConfig = config.clone().try_into()?;
        cfg.validate()?;
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, anyhow::Result<DeviceComponents>> {
        let store = self.store.clone();
        Box::pin(async move {
            let cfg: MatrixConfig = config.try_into().context("invalid avlink config")?;
            let metadata = DeviceMetadata {
                output_count: cfg.output_count,
                input_names: cfg.inputs.values().cloned().collect(),
            };

            let driver = Arc::new(AvlinkDriver::connect(cfg, store).await?);

            Ok(DeviceComponents::new()
                .with_input_controller(driver.clone())
                .with_endpoint_health(driver)
                .with_metadata(metadata))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_core::store::MemoryStateStore;

    fn factory() -> AvlinkFactory {
        AvlinkFactory::new(Arc::new(MemoryStateStore::new()))
    }

    #[test]
    fn factory_identity() {
        let factory = factory();
        assert_eq!(factory.driver_type(), "avlink");
        assert_eq!(factory.name(), "AVLink HDMI Matrix Switch");
        assert!(factory
            .capabilities()
            .contains(&Capability::InputController));
        assert!(factory.capabilities().contains(&Capability::EndpointHealth));
    }

    #[test]
    fn validate_accepts_minimal_config() {
        let config = toml::Value::Table(toml::toml! {
            address = "192.168.0.29"
        });
        assert!(factory().validate(&config).is_ok());
    }

    #[test]
    fn validate_rejects_missing_address() {
        let config = toml::Value::Table(toml::toml! {
            port = 5000
        });
        let err = factory().validate(&config).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn validate_rejects_empty_address() {
        let config = toml::Value::Table(toml::toml! {
            address = ""
        });
        let err = factory().validate(&config).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn config_defaults() {
        let config = toml::Value::Table(toml::toml! {
            address = "192.168.0.29"
        });
        let cfg: MatrixConfig = config.try_into().unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert!(cfg.inputs.is_empty());
        assert!(cfg.output_count.is_none());
    }

    #[test]
    fn config_parses_port_tables() {
        let cfg: MatrixConfig = toml::from_str(
            r#"
            address = "192.168.0.29"
            port = 4999
            timeout_secs = 2
            output_count = 8

            [outputs]
            "01" = "Living"

            [inputs]
            "02" = "Apple TV"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.port, 4999);
        assert_eq!(cfg.timeout(), Duration::from_secs(2));
        assert_eq!(cfg.outputs["01"], "Living");
        assert_eq!(cfg.inputs["02"], "Apple TV");
        assert_eq!(cfg.output_count, Some(8));
    }

    #[test]
    fn port_ids_parse_with_and_without_padding() {
        assert_eq!(parse_port_id("1").unwrap(), 1);
        assert_eq!(parse_port_id("01").unwrap(), 1);
        assert_eq!(parse_port_id("12").unwrap(), 12);
        assert!(matches!(
            parse_port_id("hdmi").unwrap_err(),
            MatrixError::UnknownPort(_)
        ));
    }

    #[test]
    fn wire_keys_are_zero_padded() {
        assert_eq!(wire_key("1"), "01");
        assert_eq!(wire_key("01"), "01");
        assert_eq!(wire_key("12"), "12");
    }
}
