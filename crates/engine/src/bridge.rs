//! The engine bridge contract.
//!
//! The storage engine lives on the other side of an asynchronous bridge that
//! only carries strings. [`Engine`] is that bridge as seen from Rust: one
//! method per engine primitive, keyed by a database or iterator handle,
//! taking already-encoded strings. The wire types below serialize to the
//! JSON shapes the bridge exchanges, so a host shell can forward them
//! verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bridgekv_core::{DbHandle, EngineError, IteratorHandle};

/// Result of a single engine call.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// One operation of an atomic batch, with encoded key and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EncodedBatchOp {
    /// Store `value` under `key`
    Put {
        /// Encoded key
        key: String,
        /// Encoded value
        value: String,
    },
    /// Remove `key`
    Del {
        /// Encoded key
        key: String,
    },
}

impl EncodedBatchOp {
    /// Encoded key the operation touches
    pub fn key(&self) -> &str {
        match self {
            EncodedBatchOp::Put { key, .. } | EncodedBatchOp::Del { key } => key,
        }
    }
}

/// Range bounds in the encoded domain.
///
/// `gt` wins over `gte` and `lt` wins over `lte` when both are given.
/// `limit` caps the number of entries visited; `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRange {
    /// Exclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<String>,
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    /// Exclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<String>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
    /// Visit keys in descending order
    #[serde(default)]
    pub reverse: bool,
    /// Maximum number of entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl EncodedRange {
    /// Whether `key` satisfies the lower bound
    pub fn above_lower(&self, key: &str) -> bool {
        match (&self.gt, &self.gte) {
            (Some(gt), _) => key > gt.as_str(),
            (None, Some(gte)) => key >= gte.as_str(),
            (None, None) => true,
        }
    }

    /// Whether `key` satisfies the upper bound
    pub fn below_upper(&self, key: &str) -> bool {
        match (&self.lt, &self.lte) {
            (Some(lt), _) => key < lt.as_str(),
            (None, Some(lte)) => key <= lte.as_str(),
            (None, None) => true,
        }
    }

    /// Whether `key` lies within both bounds
    pub fn contains(&self, key: &str) -> bool {
        self.above_lower(key) && self.below_upper(key)
    }
}

/// Everything the engine needs to create an iterator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorSpec {
    /// Bounds, direction and limit
    #[serde(flatten)]
    pub range: EncodedRange,
    /// Return keys from `read_iterator`
    pub keys: bool,
    /// Return values from `read_iterator`
    pub values: bool,
}

/// One chunk returned by `read_iterator`.
///
/// `read_count == 0` means the iterator is exhausted. A short chunk
/// (`0 < read_count < count`) does not: more entries may follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadBatch {
    /// Encoded keys, present when the iterator reads keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Encoded values, present when the iterator reads values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Number of entries in this chunk
    pub read_count: usize,
}

impl ReadBatch {
    /// Whether this chunk signals exhaustion
    pub fn is_exhausted(&self) -> bool {
        self.read_count == 0
    }
}

/// The external storage engine, reached through the string bridge.
///
/// Every method completes exactly once, with either a value or an
/// [`EngineError`]. Calls against the same handle are submitted in the
/// order they are awaited; the engine serializes them per handle.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Open (or create) the database `name` under `db`
    async fn open(
        &self,
        db: DbHandle,
        name: &str,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> EngineResult<()>;

    /// Store an encoded value under an encoded key
    async fn put(&self, db: DbHandle, key: &str, value: &str, sync: bool) -> EngineResult<()>;

    /// Fetch the encoded value for an encoded key; `None` on a miss
    async fn get(&self, db: DbHandle, key: &str) -> EngineResult<Option<String>>;

    /// Remove an encoded key
    async fn del(&self, db: DbHandle, key: &str, sync: bool) -> EngineResult<()>;

    /// Apply all operations atomically, in order
    async fn batch(&self, db: DbHandle, ops: Vec<EncodedBatchOp>) -> EngineResult<()>;

    /// Remove every key in the range
    async fn clear(&self, db: DbHandle, range: EncodedRange) -> EngineResult<()>;

    /// Close the database and release its handle
    async fn close(&self, db: DbHandle) -> EngineResult<()>;

    /// Create an iterator under `iterator`
    async fn create_iterator(
        &self,
        db: DbHandle,
        iterator: IteratorHandle,
        spec: IteratorSpec,
    ) -> EngineResult<()>;

    /// Read up to `count` entries
    async fn read_iterator(&self, iterator: IteratorHandle, count: usize)
        -> EngineResult<ReadBatch>;

    /// Reposition the iterator at `target`
    async fn seek_iterator(&self, iterator: IteratorHandle, target: &str) -> EngineResult<()>;

    /// Release the iterator
    async fn end_iterator(&self, iterator: IteratorHandle) -> EngineResult<()>;
}
