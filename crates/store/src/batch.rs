//! Chained write batch.

use bytes::Bytes;

use bridgekv_core::Result;

use crate::options::BatchOp;
use crate::store::Store;

/// Operations collected against a store and applied atomically by
/// [`write`](WriteBatch::write).
///
/// # Example
///
/// ```ignore
/// store.write_batch().put("a", "1").put("b", "2").del("c").write().await?;
/// ```
#[derive(Debug)]
#[must_use = "a write batch does nothing until `write` is awaited"]
pub struct WriteBatch<'a> {
    store: &'a Store,
    ops: Vec<BatchOp>,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    /// Queue a put
    pub fn put(mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.ops.push(BatchOp::put(key, value));
        self
    }

    /// Queue a delete
    pub fn del(mut self, key: impl Into<Bytes>) -> Self {
        self.ops.push(BatchOp::del(key));
        self
    }

    /// Drop every queued operation
    pub fn clear(mut self) -> Self {
        self.ops.clear();
        self
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations, in order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Apply the queued operations as one atomic batch
    pub async fn write(self) -> Result<()> {
        self.store.batch(self.ops).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::StoreConfig;
    use bridgekv_core::HandleRegistry;
    use bridgekv_engine::MemoryEngine;

    fn store() -> Store {
        Store::with_config(
            "batch",
            Arc::new(MemoryEngine::new()),
            StoreConfig::default(),
            Arc::new(HandleRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_chaining_keeps_order() {
        let store = store();
        let batch = store.write_batch().put("a", "1").del("b").put("c", "3");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ops()[1], BatchOp::del("b"));
    }

    #[test]
    fn test_clear_empties_batch() {
        let store = store();
        let batch = store.write_batch().put("a", "1").clear();
        assert!(batch.is_empty());
    }
}
