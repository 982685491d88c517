//! State-store collaborator.
//!
//! Drivers publish normalized device state as JSON merge patches; the host
//! framework owns the actual store. [`StateStore`] is the seam, and
//! [`MemoryStateStore`] is an in-process implementation used by tests and
//! standalone hosts.
//!
//! Merge semantics are last-merge-wins per key: objects merge recursively,
//! everything else is replaced. Drivers only ever write through this boundary;
//! they never read the store back for decision-making.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// Ingest boundary for normalized device state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Merge a JSON patch into the store.
    ///
    /// Each call must be applied atomically: a reader never observes a
    /// partially merged patch.
    async fn ingest(&self, patch: Value) -> Result<()>;
}

/// In-memory [`StateStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    root: RwLock<Value>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(serde_json::Map::new())),
        }
    }

    /// Current contents of the store.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn ingest(&self, patch: Value) -> Result<()> {
        let mut root = self.root.write().await;
        merge(&mut root, patch);
        Ok(())
    }
}

/// Recursively merge `patch` into `dst`.
///
/// Object keys merge key-by-key; any other value replaces the destination.
fn merge(dst: &mut Value, patch: Value) {
    match (dst, patch) {
        (Value::Object(dst_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match dst_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        dst_map.insert(key, value);
                    }
                }
            }
        }
        (dst, patch) => *dst = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ingest_merges_nested_objects() {
        let store = MemoryStateStore::new();

        store
            .ingest(json!({"output": {"01": {"name": "Living", "input": "02"}}}))
            .await
            .unwrap();
        store
            .ingest(json!({"output": {"03": {"name": "Bedroom", "input": "04"}}}))
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot["output"]["01"]["name"], "Living");
        assert_eq!(snapshot["output"]["03"]["name"], "Bedroom");
    }

    #[tokio::test]
    async fn last_merge_wins_per_key() {
        let store = MemoryStateStore::new();

        store
            .ingest(json!({"output": {"01": {"input": "02"}}}))
            .await
            .unwrap();
        store
            .ingest(json!({"output": {"01": {"input": "05"}}}))
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot["output"]["01"]["input"], "05");
    }

    #[tokio::test]
    async fn scalar_replaces_object() {
        let store = MemoryStateStore::new();

        store.ingest(json!({"status": {"up": true}})).await.unwrap();
        store.ingest(json!({"status": "down"})).await.unwrap();

        assert_eq!(store.snapshot().await["status"], "down");
    }
}
