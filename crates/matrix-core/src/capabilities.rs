//! Atomic device capabilities.
//!
//! Devices implement the specific capabilities they actually support instead
//! of one monolithic device trait: an AV matrix implements
//! `InputController + EndpointHealth`, a hypothetical volume box might add a
//! level capability, and host code works against trait bounds rather than
//! concrete drivers.
//!
//! Each capability trait:
//! - is async where it touches hardware (`#[async_trait]`)
//! - is thread-safe (`Send + Sync`)
//! - uses `anyhow::Result` for errors
//! - focuses on one thing

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reachability of a device endpoint as reported by its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connectivity {
    /// The transport is up and commands can be issued.
    Ok,
    /// The transport is down or was never established.
    Unreachable,
}

impl Connectivity {
    /// Wire-format label used by host frameworks ("OK" / "UNREACHABLE").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Unreachable => "UNREACHABLE",
        }
    }
}

/// Capability: endpoint health reporting.
///
/// Synchronous by design — implementations answer from cached transport
/// state, never by probing hardware.
pub trait EndpointHealth: Send + Sync {
    /// Current reachability of the endpoint.
    fn connectivity(&self) -> Connectivity;
}

/// Capability: input selection on a routing device.
///
/// # Contract
/// - `endpoint_id` is the device-native id of an output endpoint (for a
///   matrix switch, the wire id of an output port).
/// - `select_input` takes the human-readable input name as presented to the
///   user; implementations own the name-to-wire-id mapping.
/// - `selected_input` answers from the device's last known state and returns
///   `None` when no status has been observed yet for that endpoint.
#[async_trait]
pub trait InputController: Send + Sync {
    /// Route the named input to the given output endpoint.
    async fn select_input(&self, endpoint_id: &str, input_name: &str) -> Result<()>;

    /// Display name of the input currently routed to the endpoint, if known.
    async fn selected_input(&self, endpoint_id: &str) -> Result<Option<String>>;

    /// Display names of all selectable inputs.
    fn available_inputs(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_labels() {
        assert_eq!(Connectivity::Ok.label(), "OK");
        assert_eq!(Connectivity::Unreachable.label(), "UNREACHABLE");
    }

    #[test]
    fn connectivity_serde() {
        let json = serde_json::to_string(&Connectivity::Ok).unwrap();
        assert_eq!(json, "\"OK\"");

        let back: Connectivity = serde_json::from_str("\"UNREACHABLE\"").unwrap();
        assert_eq!(back, Connectivity::Unreachable);
    }
}
