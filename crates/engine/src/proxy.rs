//! Engine proxy: the adapter's only door to the engine.
//!
//! `EngineProxy` wraps an [`Engine`] and turns each bridge call into one
//! awaited `Result` in the adapter's error taxonomy. It adds call tracing,
//! maps engine failures to [`Error::Engine`], and checks the shape of every
//! `read_iterator` response before anyone decodes it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use bridgekv_core::{DbHandle, EngineError, Error, IteratorHandle, Result};

use crate::bridge::{EncodedBatchOp, EncodedRange, Engine, IteratorSpec, ReadBatch};

/// Cheaply clonable call surface over an [`Engine`].
#[derive(Clone)]
pub struct EngineProxy {
    engine: Arc<dyn Engine>,
}

fn engine_failure(op: &'static str, err: EngineError) -> Error {
    debug!(op, code = %err.code, message = %err.message, "engine call failed");
    Error::Engine(err)
}

impl EngineProxy {
    /// Wrap an engine
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// The wrapped engine
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Open the database `name` under `db`. The name is sent as-is.
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db, store = name))]
    pub async fn open_store(
        &self,
        db: DbHandle,
        name: &str,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> Result<()> {
        self.engine
            .open(db, name, create_if_missing, error_if_exists)
            .await
            .map_err(|e| engine_failure("open", e))
    }

    /// Store an encoded value
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db, sync))]
    pub async fn put(&self, db: DbHandle, key: &str, value: &str, sync: bool) -> Result<()> {
        self.engine
            .put(db, key, value, sync)
            .await
            .map_err(|e| engine_failure("put", e))
    }

    /// Fetch an encoded value; `None` on a miss
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db))]
    pub async fn get(&self, db: DbHandle, key: &str) -> Result<Option<String>> {
        self.engine
            .get(db, key)
            .await
            .map_err(|e| engine_failure("get", e))
    }

    /// Remove an encoded key
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db, sync))]
    pub async fn delete(&self, db: DbHandle, key: &str, sync: bool) -> Result<()> {
        self.engine
            .del(db, key, sync)
            .await
            .map_err(|e| engine_failure("del", e))
    }

    /// Apply encoded operations atomically
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db, ops = ops.len()))]
    pub async fn batch(&self, db: DbHandle, ops: Vec<EncodedBatchOp>) -> Result<()> {
        self.engine
            .batch(db, ops)
            .await
            .map_err(|e| engine_failure("batch", e))
    }

    /// Remove every key in an encoded range
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db))]
    pub async fn clear(&self, db: DbHandle, range: EncodedRange) -> Result<()> {
        self.engine
            .clear(db, range)
            .await
            .map_err(|e| engine_failure("clear", e))
    }

    /// Close the database
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db))]
    pub async fn close_store(&self, db: DbHandle) -> Result<()> {
        self.engine
            .close(db)
            .await
            .map_err(|e| engine_failure("close", e))
    }

    /// Create an iterator under `iterator`
    #[tracing::instrument(level = "trace", skip_all, fields(db = %db, iterator = %iterator))]
    pub async fn create_iterator(
        &self,
        db: DbHandle,
        iterator: IteratorHandle,
        spec: IteratorSpec,
    ) -> Result<()> {
        self.engine
            .create_iterator(db, iterator, spec)
            .await
            .map_err(|e| engine_failure("create_iterator", e))
    }

    /// Read up to `max_count` entries and check the response shape.
    ///
    /// When `keys` (`values`) is set the response must carry a key (value)
    /// list of exactly `read_count` entries, and `read_count` may never
    /// exceed `max_count`. Anything else is a protocol error.
    #[tracing::instrument(level = "trace", skip_all, fields(iterator = %iterator, max_count))]
    pub async fn read_iterator(
        &self,
        iterator: IteratorHandle,
        max_count: usize,
        keys: bool,
        values: bool,
    ) -> Result<ReadBatch> {
        let batch = self
            .engine
            .read_iterator(iterator, max_count)
            .await
            .map_err(|e| engine_failure("read_iterator", e))?;
        check_read_batch(&batch, max_count, keys, values)?;
        trace!(read_count = batch.read_count, "read batch");
        Ok(batch)
    }

    /// Reposition an iterator at an encoded target
    #[tracing::instrument(level = "trace", skip_all, fields(iterator = %iterator))]
    pub async fn seek_iterator(&self, iterator: IteratorHandle, target: &str) -> Result<()> {
        self.engine
            .seek_iterator(iterator, target)
            .await
            .map_err(|e| engine_failure("seek_iterator", e))
    }

    /// Release an iterator
    #[tracing::instrument(level = "trace", skip_all, fields(iterator = %iterator))]
    pub async fn end_iterator(&self, iterator: IteratorHandle) -> Result<()> {
        self.engine
            .end_iterator(iterator)
            .await
            .map_err(|e| engine_failure("end_iterator", e))
    }
}

impl fmt::Debug for EngineProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineProxy").finish_non_exhaustive()
    }
}

fn check_read_batch(batch: &ReadBatch, max_count: usize, keys: bool, values: bool) -> Result<()> {
    if batch.read_count > max_count {
        return Err(Error::malformed(format!(
            "readCount {} exceeds requested {}",
            batch.read_count, max_count
        )));
    }
    check_column("keys", keys, batch.keys.as_deref(), batch.read_count)?;
    check_column("values", values, batch.values.as_deref(), batch.read_count)
}

fn check_column(
    name: &str,
    requested: bool,
    column: Option<&[String]>,
    read_count: usize,
) -> Result<()> {
    if !requested {
        return Ok(());
    }
    match column {
        Some(items) if items.len() == read_count => Ok(()),
        Some(items) => Err(Error::malformed(format!(
            "readCount {} but {} {}",
            read_count,
            items.len(),
            name
        ))),
        // An exhausted iterator may omit the lists altogether.
        None if read_count == 0 => Ok(()),
        None => Err(Error::malformed(format!("missing {}", name))),
    }
}
