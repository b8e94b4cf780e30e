//! Store adapter: the byte-level key-value API over the engine bridge.
//!
//! Keys and values are encoded with the configured codec on the way in and
//! decoded on the way out. Each store owns one database handle for its whole
//! life and tracks its own open/closed status; the engine is only reached
//! through the [`EngineProxy`].

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use bridgekv_core::codec::get_codec;
use bridgekv_core::{BridgeCodec, Capabilities, DbHandle, Error, HandleRegistry, Payload, Result};
use bridgekv_engine::{Engine, EngineProxy, IteratorSpec};

use crate::batch::WriteBatch;
use crate::config::StoreConfig;
use crate::iterator::{IteratorParams, StoreIterator};
use crate::options::{
    BatchOp, IteratorOptions, OpenOptions, RangeOptions, ReadOptions, WriteOptions,
};

/// Lifecycle of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// Constructed, never opened
    New,
    /// `open` in flight
    Opening,
    /// Ready for data operations
    Open,
    /// `close` in flight
    Closing,
    /// Closed; may be opened again
    Closed,
}

/// An ordered key-value store backed by an engine database.
///
/// # Example
///
/// ```ignore
/// let store = Store::new("users", Arc::new(MemoryEngine::new()))?;
/// store.open(OpenOptions::default()).await?;
/// store.put("a", "1").await?;
/// assert_eq!(store.get("a").await?.as_bytes(), b"1");
/// store.close().await?;
/// ```
pub struct Store {
    name: String,
    handle: DbHandle,
    proxy: EngineProxy,
    codec: Arc<dyn BridgeCodec>,
    config: StoreConfig,
    registry: Arc<HandleRegistry>,
    status: Mutex<StoreStatus>,
    live_iterators: Arc<AtomicUsize>,
    // Bumped on every completed close; iterators from an earlier epoch are stale.
    closes: Arc<AtomicU64>,
}

impl Store {
    /// Create a store for the database `name` with the default config and
    /// the process-wide handle registry.
    pub fn new(name: impl Into<String>, engine: Arc<dyn Engine>) -> Result<Self> {
        Self::with_config(name, engine, StoreConfig::default(), HandleRegistry::global())
    }

    /// Create a store with an explicit config and handle registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid config and `Error::State` if
    /// the registry has no database handles left.
    pub fn with_config(
        name: impl Into<String>,
        engine: Arc<dyn Engine>,
        config: StoreConfig,
        registry: Arc<HandleRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let codec: Arc<dyn BridgeCodec> =
            Arc::from(get_codec(&config.codec).map_err(|e| Error::config(e.to_string()))?);
        let handle = registry.next_db_handle()?;
        Ok(Self {
            name: name.into(),
            handle,
            proxy: EngineProxy::new(engine),
            codec,
            config,
            registry,
            status: Mutex::new(StoreStatus::New),
            live_iterators: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Database name, as sent to the engine
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine handle of this store
    pub fn handle(&self) -> DbHandle {
        self.handle
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current status
    pub fn status(&self) -> StoreStatus {
        *self.status.lock()
    }

    /// Iterators created by this store that have not been ended or dropped
    pub fn live_iterators(&self) -> usize {
        self.live_iterators.load(Ordering::SeqCst)
    }

    /// Fixed capability flags
    pub fn supports(&self) -> Capabilities {
        Capabilities::BRIDGE
    }

    /// Open the database.
    ///
    /// Allowed on a new or closed store. On failure the store keeps its
    /// previous status.
    pub async fn open(&self, options: OpenOptions) -> Result<()> {
        let previous = self.transition(
            |s| matches!(s, StoreStatus::New | StoreStatus::Closed),
            StoreStatus::Opening,
            "open",
        )?;
        let opened = self
            .proxy
            .open_store(
                self.handle,
                &self.name,
                options.create_if_missing,
                options.error_if_exists,
            )
            .await;
        match opened {
            Ok(()) => {
                *self.status.lock() = StoreStatus::Open;
                info!(store = %self.name, db = %self.handle, "store opened");
                Ok(())
            }
            Err(e) => {
                *self.status.lock() = previous;
                Err(e)
            }
        }
    }

    /// Close the database.
    ///
    /// Iterators should be ended first; any still live are reported, and
    /// fail with a state error from then on.
    /// On failure the store stays open.
    pub async fn close(&self) -> Result<()> {
        self.transition(|s| s == StoreStatus::Open, StoreStatus::Closing, "close")?;
        let live = self.live_iterators();
        if live > 0 {
            warn!(store = %self.name, live, "closing store with live iterators");
        }
        match self.proxy.close_store(self.handle).await {
            Ok(()) => {
                self.closes.fetch_add(1, Ordering::SeqCst);
                *self.status.lock() = StoreStatus::Closed;
                info!(store = %self.name, db = %self.handle, "store closed");
                Ok(())
            }
            Err(e) => {
                *self.status.lock() = StoreStatus::Open;
                Err(e)
            }
        }
    }

    /// Store `value` under `key`
    pub async fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_with_options(key, value, WriteOptions::default()).await
    }

    /// Store `value` under `key` with write options
    pub async fn put_with_options(
        &self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: WriteOptions,
    ) -> Result<()> {
        self.ensure_open("put")?;
        let key = self.codec.encode_key(key.as_ref());
        let value = self.codec.encode_value(value.as_ref());
        self.proxy.put(self.handle, &key, &value, options.sync).await
    }

    /// Fetch the value under `key` as bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the key is absent.
    pub async fn get(&self, key: impl AsRef<[u8]>) -> Result<Payload> {
        self.get_with_options(key, ReadOptions::default()).await
    }

    /// Fetch the value under `key` with read options
    pub async fn get_with_options(
        &self,
        key: impl AsRef<[u8]>,
        options: ReadOptions,
    ) -> Result<Payload> {
        self.ensure_open("get")?;
        let key = self.codec.encode_key(key.as_ref());
        let encoded = self
            .proxy
            .get(self.handle, &key)
            .await?
            .ok_or(Error::NotFound)?;
        let value = self.codec.decode_value(&encoded)?;
        Ok(Payload::from_decoded(value, options.as_bytes))
    }

    /// Remove `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.delete_with_options(key, WriteOptions::default()).await
    }

    /// Remove `key` with write options
    pub async fn delete_with_options(
        &self,
        key: impl AsRef<[u8]>,
        options: WriteOptions,
    ) -> Result<()> {
        self.ensure_open("delete")?;
        let key = self.codec.encode_key(key.as_ref());
        self.proxy.delete(self.handle, &key, options.sync).await
    }

    /// Apply `ops` atomically, in order.
    ///
    /// An empty batch succeeds without reaching the engine.
    pub async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        self.ensure_open("batch")?;
        if ops.is_empty() {
            return Ok(());
        }
        let encoded = ops.iter().map(|op| op.encode(self.codec.as_ref())).collect();
        self.proxy.batch(self.handle, encoded).await
    }

    /// Start a chained batch
    pub fn write_batch(&self) -> WriteBatch<'_> {
        WriteBatch::new(self)
    }

    /// Remove every key in `range`
    pub async fn clear(&self, range: RangeOptions) -> Result<()> {
        self.ensure_open("clear")?;
        let range = range.encode(self.codec.as_ref());
        self.proxy.clear(self.handle, range).await
    }

    /// Create an iterator over the store.
    ///
    /// The engine takes its snapshot when the iterator is created, so writes
    /// made afterwards are not visible to it.
    pub async fn iterator(&self, options: IteratorOptions) -> Result<StoreIterator> {
        self.ensure_open("iterator")?;
        let handle = self.registry.next_iterator_handle();
        let spec = IteratorSpec {
            range: options.range.encode(self.codec.as_ref()),
            keys: options.keys,
            values: options.values,
        };
        self.proxy.create_iterator(self.handle, handle, spec).await?;
        debug!(store = %self.name, iterator = %handle, "iterator created");
        Ok(StoreIterator::new(
            self.proxy.clone(),
            Arc::clone(&self.codec),
            handle,
            &options,
            IteratorParams {
                read_batch_size: self.config.read_batch_size,
                drain_budget: self.config.drain_budget,
                live: Arc::clone(&self.live_iterators),
                closes: Arc::clone(&self.closes),
            },
        ))
    }

    fn ensure_open(&self, op: &str) -> Result<()> {
        match *self.status.lock() {
            StoreStatus::Open => Ok(()),
            status => Err(Error::state(format!(
                "cannot {} on store '{}': status is {:?}",
                op, self.name, status
            ))),
        }
    }

    /// Move to `next` if `allowed` holds for the current status, returning
    /// the status it replaced. The lock is released before any await.
    fn transition(
        &self,
        allowed: impl Fn(StoreStatus) -> bool,
        next: StoreStatus,
        op: &str,
    ) -> Result<StoreStatus> {
        let mut status = self.status.lock();
        let current = *status;
        if !allowed(current) {
            return Err(Error::state(format!(
                "cannot {} store '{}': status is {:?}",
                op, self.name, current
            )));
        }
        *status = next;
        Ok(current)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("status", &self.status())
            .field("codec", &self.codec.codec_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgekv_engine::MemoryEngine;

    fn store(name: &str) -> Store {
        Store::with_config(
            name,
            Arc::new(MemoryEngine::new()),
            StoreConfig::default(),
            Arc::new(HandleRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_store_is_new() {
        let store = store("t");
        assert_eq!(store.status(), StoreStatus::New);
        assert_eq!(store.handle(), DbHandle::new(1));
        assert_eq!(store.name(), "t");
        assert!(store.supports().seek);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig {
            read_batch_size: 0,
            ..StoreConfig::default()
        };
        let err = Store::with_config(
            "t",
            Arc::new(MemoryEngine::new()),
            config,
            Arc::new(HandleRegistry::new()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_data_ops_require_open() {
        let store = store("t");
        let err = store.put("a", "1").await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
        assert!(store.close().await.is_err());
    }

    #[tokio::test]
    async fn test_open_twice_is_state_error() {
        let store = store("t");
        store.open(OpenOptions::default()).await.unwrap();
        let err = store.open(OpenOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
        assert_eq!(store.status(), StoreStatus::Open);
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let store = store("t");
        store.open(OpenOptions::default()).await.unwrap();
        store.put("a", "1").await.unwrap();
        store.close().await.unwrap();
        assert_eq!(store.status(), StoreStatus::Closed);

        store.open(OpenOptions::default()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_bytes(), b"1");
    }
}
