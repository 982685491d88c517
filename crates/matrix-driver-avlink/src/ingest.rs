//! Status ingestion.
//!
//! Translates decoded status replies into normalized [`PortMapping`] state and
//! publishes it to the host's state store, one merge patch per output id. A
//! local last-seen snapshot backs the driver's read path so the external store
//! is never read back.

use crate::protocol::StatusReply;
use anyhow::Result;
use matrix_core::store::StateStore;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved state of one output: which input it currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    /// Two-digit wire id of the output
    pub output: String,
    /// Display name of the output
    pub name: String,
    /// Two-digit wire id of the routed input
    pub input: String,
    /// Display name of the routed input
    pub input_name: String,
}

/// Publishes decoded status replies into the state store.
///
/// Owns the id-to-name tables from configuration. Records referencing output
/// ids absent from the table are expected (unused ports on the switch) and
/// skipped without logging.
pub struct StatusIngestor {
    outputs: HashMap<String, String>,
    inputs: HashMap<String, String>,
    store: Arc<dyn StateStore>,
    snapshot: RwLock<HashMap<String, PortMapping>>,
}

impl StatusIngestor {
    /// Create an ingestor over the configured id-to-name tables.
    pub fn new(
        outputs: HashMap<String, String>,
        inputs: HashMap<String, String>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            outputs,
            inputs,
            store,
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    /// Publish a reply into the state store under the `"output"` namespace.
    ///
    /// Each configured output in the reply becomes one
    /// `{"output": {<id>: <mapping>}}` merge patch, so a mapping is always
    /// visible whole or not at all.
    pub async fn publish(&self, reply: &StatusReply) -> Result<()> {
        for record in &reply.records {
            let Some(output_name) = self.outputs.get(&record.output) else {
                continue;
            };
            let input_name = self
                .inputs
                .get(&record.input)
                .cloned()
                .unwrap_or_else(|| record.input.clone());

            let mapping = PortMapping {
                output: record.output.clone(),
                name: output_name.clone(),
                input: record.input.clone(),
                input_name,
            };

            tracing::debug!(
                output = %mapping.output,
                input = %mapping.input,
                input_name = %mapping.input_name,
                "publishing port mapping"
            );
            let key = record.output.clone();
            self.store
                .ingest(json!({ "output": { key: &mapping } }))
                .await?;
            self.snapshot
                .write()
                .insert(record.output.clone(), mapping);
        }
        Ok(())
    }

    /// Last published mapping for an output, if any status mentioned it yet.
    pub fn mapping(&self, output_id: &str) -> Option<PortMapping> {
        self.snapshot.read().get(output_id).cloned()
    }
}
