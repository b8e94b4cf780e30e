//! Options for store operations.
//!
//! Range bounds are given as raw bytes and encoded with the store's codec
//! just before they cross the bridge. The legacy `start`/`end` pair is folded
//! into `gte`/`lte` here: `start` is the bound iteration begins from, so
//! under `reverse` it is the upper bound.

use bytes::Bytes;

use bridgekv_core::BridgeCodec;
use bridgekv_engine::{EncodedBatchOp, EncodedRange};

/// Options for [`Store::open`](crate::Store::open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Create the database if it does not exist (default: true)
    pub create_if_missing: bool,
    /// Fail if the database already exists (default: false)
    pub error_if_exists: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
        }
    }
}

/// Options for write operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Ask the engine to make the write durable before acknowledging it.
    /// Default: false (the engine may defer durability).
    pub sync: bool,
}

/// Options for [`Store::get_with_options`](crate::Store::get_with_options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Return raw bytes rather than text (default: true)
    pub as_bytes: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { as_bytes: true }
    }
}

/// One operation of an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store `value` under `key`
    Put {
        /// Key bytes
        key: Bytes,
        /// Value bytes
        value: Bytes,
    },
    /// Remove `key`
    Del {
        /// Key bytes
        key: Bytes,
    },
}

impl BatchOp {
    /// Put operation
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Delete operation
    pub fn del(key: impl Into<Bytes>) -> Self {
        BatchOp::Del { key: key.into() }
    }

    pub(crate) fn encode(&self, codec: &dyn BridgeCodec) -> EncodedBatchOp {
        match self {
            BatchOp::Put { key, value } => EncodedBatchOp::Put {
                key: codec.encode_key(key),
                value: codec.encode_value(value),
            },
            BatchOp::Del { key } => EncodedBatchOp::Del {
                key: codec.encode_key(key),
            },
        }
    }
}

/// Key range with direction and limit.
///
/// Used directly by [`Store::clear`](crate::Store::clear) and embedded in
/// [`IteratorOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeOptions {
    /// Exclusive lower bound
    pub gt: Option<Bytes>,
    /// Inclusive lower bound
    pub gte: Option<Bytes>,
    /// Exclusive upper bound
    pub lt: Option<Bytes>,
    /// Inclusive upper bound
    pub lte: Option<Bytes>,
    /// Legacy inclusive bound where iteration starts
    pub start: Option<Bytes>,
    /// Legacy inclusive bound where iteration ends
    pub end: Option<Bytes>,
    /// Descending key order
    pub reverse: bool,
    /// Maximum number of entries; `None` for no limit
    pub limit: Option<u64>,
}

impl RangeOptions {
    /// Fold legacy `start`/`end` into `gte`/`lte`.
    ///
    /// Explicit `gte`/`lte` win over the legacy pair.
    pub fn normalized(&self) -> RangeOptions {
        let (lower, upper) = if self.reverse {
            (&self.end, &self.start)
        } else {
            (&self.start, &self.end)
        };
        RangeOptions {
            gt: self.gt.clone(),
            gte: self.gte.clone().or_else(|| lower.clone()),
            lt: self.lt.clone(),
            lte: self.lte.clone().or_else(|| upper.clone()),
            start: None,
            end: None,
            reverse: self.reverse,
            limit: self.limit,
        }
    }

    /// Normalize and encode the bounds for the engine.
    pub fn encode(&self, codec: &dyn BridgeCodec) -> EncodedRange {
        let range = self.normalized();
        let enc = |bound: &Option<Bytes>| bound.as_deref().map(|k| codec.encode_key(k));
        EncodedRange {
            gt: enc(&range.gt),
            gte: enc(&range.gte),
            lt: enc(&range.lt),
            lte: enc(&range.lte),
            reverse: range.reverse,
            limit: range.limit,
        }
    }

    /// Set an exclusive lower bound
    pub fn gt(mut self, key: impl Into<Bytes>) -> Self {
        self.gt = Some(key.into());
        self
    }

    /// Set an inclusive lower bound
    pub fn gte(mut self, key: impl Into<Bytes>) -> Self {
        self.gte = Some(key.into());
        self
    }

    /// Set an exclusive upper bound
    pub fn lt(mut self, key: impl Into<Bytes>) -> Self {
        self.lt = Some(key.into());
        self
    }

    /// Set an inclusive upper bound
    pub fn lte(mut self, key: impl Into<Bytes>) -> Self {
        self.lte = Some(key.into());
        self
    }

    /// Iterate in descending key order
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Visit at most `limit` entries
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`Store::iterator`](crate::Store::iterator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorOptions {
    /// Bounds, direction and limit
    pub range: RangeOptions,
    /// Yield keys (default: true)
    pub keys: bool,
    /// Yield values (default: true)
    pub values: bool,
    /// Yield keys as bytes rather than text (default: true)
    pub key_as_bytes: bool,
    /// Yield values as bytes rather than text (default: true)
    pub value_as_bytes: bool,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            range: RangeOptions::default(),
            keys: true,
            values: true,
            key_as_bytes: true,
            value_as_bytes: true,
        }
    }
}

impl IteratorOptions {
    /// Set an exclusive lower bound
    pub fn gt(mut self, key: impl Into<Bytes>) -> Self {
        self.range = self.range.gt(key);
        self
    }

    /// Set an inclusive lower bound
    pub fn gte(mut self, key: impl Into<Bytes>) -> Self {
        self.range = self.range.gte(key);
        self
    }

    /// Set an exclusive upper bound
    pub fn lt(mut self, key: impl Into<Bytes>) -> Self {
        self.range = self.range.lt(key);
        self
    }

    /// Set an inclusive upper bound
    pub fn lte(mut self, key: impl Into<Bytes>) -> Self {
        self.range = self.range.lte(key);
        self
    }

    /// Set the legacy `start` bound
    pub fn start(mut self, key: impl Into<Bytes>) -> Self {
        self.range.start = Some(key.into());
        self
    }

    /// Set the legacy `end` bound
    pub fn end(mut self, key: impl Into<Bytes>) -> Self {
        self.range.end = Some(key.into());
        self
    }

    /// Iterate in descending key order
    pub fn reverse(mut self) -> Self {
        self.range = self.range.reverse();
        self
    }

    /// Yield at most `limit` entries
    pub fn limit(mut self, limit: u64) -> Self {
        self.range = self.range.limit(limit);
        self
    }

    /// Yield keys only
    pub fn keys_only(mut self) -> Self {
        self.keys = true;
        self.values = false;
        self
    }

    /// Yield values only
    pub fn values_only(mut self) -> Self {
        self.keys = false;
        self.values = true;
        self
    }

    /// Yield keys and values as text
    pub fn as_text(mut self) -> Self {
        self.key_as_bytes = false;
        self.value_as_bytes = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgekv_core::OrderedCodec;

    #[test]
    fn test_defaults() {
        let open = OpenOptions::default();
        assert!(open.create_if_missing);
        assert!(!open.error_if_exists);
        assert!(!WriteOptions::default().sync);
        assert!(ReadOptions::default().as_bytes);

        let it = IteratorOptions::default();
        assert!(it.keys && it.values);
        assert!(it.key_as_bytes && it.value_as_bytes);
        assert_eq!(it.range.limit, None);
    }

    #[test]
    fn test_legacy_forward_normalization() {
        let range = RangeOptions {
            start: Some(Bytes::from_static(b"a")),
            end: Some(Bytes::from_static(b"m")),
            ..Default::default()
        }
        .normalized();
        assert_eq!(range.gte, Some(Bytes::from_static(b"a")));
        assert_eq!(range.lte, Some(Bytes::from_static(b"m")));
        assert_eq!(range.start, None);
        assert_eq!(range.end, None);
    }

    #[test]
    fn test_legacy_reverse_normalization() {
        let range = RangeOptions {
            start: Some(Bytes::from_static(b"m")),
            end: Some(Bytes::from_static(b"a")),
            reverse: true,
            ..Default::default()
        }
        .normalized();
        assert_eq!(range.lte, Some(Bytes::from_static(b"m")));
        assert_eq!(range.gte, Some(Bytes::from_static(b"a")));
    }

    #[test]
    fn test_explicit_bounds_win_over_legacy() {
        let range = RangeOptions {
            gte: Some(Bytes::from_static(b"c")),
            start: Some(Bytes::from_static(b"a")),
            ..Default::default()
        }
        .normalized();
        assert_eq!(range.gte, Some(Bytes::from_static(b"c")));
    }

    #[test]
    fn test_encode_range() {
        let encoded = RangeOptions::default()
            .gt(&b"a"[..])
            .lte(vec![0xff])
            .reverse()
            .limit(3)
            .encode(&OrderedCodec);
        assert_eq!(encoded.gt.as_deref(), Some("61"));
        assert_eq!(encoded.lte.as_deref(), Some("ff"));
        assert_eq!(encoded.gte, None);
        assert!(encoded.reverse);
        assert_eq!(encoded.limit, Some(3));
    }

    #[test]
    fn test_encode_batch_ops() {
        let put = BatchOp::put(&b"k"[..], vec![0x00]).encode(&OrderedCodec);
        assert_eq!(
            put,
            EncodedBatchOp::Put {
                key: "6b".to_string(),
                value: "__bytes__:AA==".to_string(),
            }
        );
        let del = BatchOp::del(&b"k"[..]).encode(&OrderedCodec);
        assert_eq!(del.key(), "6b");
    }

    #[test]
    fn test_iterator_builders() {
        let opts = IteratorOptions::default()
            .gte(&b"a"[..])
            .lt(&b"z"[..])
            .keys_only()
            .as_text();
        assert!(opts.keys && !opts.values);
        assert!(!opts.key_as_bytes);
        assert_eq!(opts.range.gte, Some(Bytes::from_static(b"a")));
        assert_eq!(opts.range.lt, Some(Bytes::from_static(b"z")));
    }
}
