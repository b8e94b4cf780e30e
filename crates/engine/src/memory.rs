//! In-process reference engine.
//!
//! `MemoryEngine` implements the bridge contract the way the native engine
//! module does, entirely in memory:
//!
//! - Databases are named tables of encoded key → encoded value, kept in
//!   encoded-key order. A table outlives the handle that opened it, so
//!   close-then-reopen under a new handle sees earlier writes.
//! - Handles are validated on every call (`E_UNKNOWN_HANDLE`,
//!   `E_ALREADY_OPEN`, `E_ALREADY_INITIALIZED`).
//! - Each iterator reads from a snapshot taken at creation, honours
//!   `gt`/`gte`/`lt`/`lte`, `reverse` and `limit`, and supports seek. Seeking
//!   to a target outside the iterator's range exhausts it.
//! - Closing a database releases the iterators created on it.
//!
//! It also carries the knobs the adapter's tests need: one-shot failure
//! injection per operation ([`fail_next`](MemoryEngine::fail_next)), call
//! counters ([`calls`](MemoryEngine::calls)) and a cap on the size of read
//! chunks ([`with_max_read`](MemoryEngine::with_max_read)) to produce short
//! batches.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use bridgekv_core::error::codes;
use bridgekv_core::{DbHandle, EngineError, IteratorHandle};

use crate::bridge::{EncodedBatchOp, EncodedRange, Engine, EngineResult, IteratorSpec, ReadBatch};

/// Engine primitive, used to address failpoints and call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// `open`
    Open,
    /// `put`
    Put,
    /// `get`
    Get,
    /// `del`
    Del,
    /// `batch`
    Batch,
    /// `clear`
    Clear,
    /// `close`
    Close,
    /// `create_iterator`
    CreateIterator,
    /// `read_iterator`
    ReadIterator,
    /// `seek_iterator`
    SeekIterator,
    /// `end_iterator`
    EndIterator,
}

type Table = BTreeMap<String, String>;

struct OpenDatabase {
    name: String,
}

struct MemoryIterator {
    db: DbHandle,
    /// Snapshot of the in-range entries, in iteration order.
    entries: Vec<(String, String)>,
    position: usize,
    steps: u64,
    spec: IteratorSpec,
}

impl MemoryIterator {
    fn is_ended(&self) -> bool {
        self.position >= self.entries.len()
            || self.spec.range.limit.map_or(false, |limit| self.steps >= limit)
    }

    fn seek(&mut self, target: &str) {
        if !self.spec.range.contains(target) {
            self.position = self.entries.len();
            return;
        }
        self.position = if self.spec.range.reverse {
            self.entries.partition_point(|(k, _)| k.as_str() > target)
        } else {
            self.entries.partition_point(|(k, _)| k.as_str() < target)
        };
    }

    fn read(&mut self, count: usize) -> ReadBatch {
        let mut keys = self.spec.keys.then(Vec::new);
        let mut values = self.spec.values.then(Vec::new);
        let mut read_count = 0;
        while read_count < count && !self.is_ended() {
            let (key, value) = &self.entries[self.position];
            if let Some(keys) = keys.as_mut() {
                keys.push(key.clone());
            }
            if let Some(values) = values.as_mut() {
                values.push(value.clone());
            }
            self.position += 1;
            self.steps += 1;
            read_count += 1;
        }
        ReadBatch {
            keys,
            values,
            read_count,
        }
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Table>,
    open: HashMap<DbHandle, OpenDatabase>,
    iterators: HashMap<IteratorHandle, MemoryIterator>,
    failpoints: HashMap<EngineOp, VecDeque<EngineError>>,
    calls: HashMap<EngineOp, usize>,
}

impl Inner {
    fn enter(&mut self, op: EngineOp) -> EngineResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failpoints.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!(?op, code = %err.code, "injected engine failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn table_mut(&mut self, db: DbHandle) -> EngineResult<&mut Table> {
        let name = &self
            .open
            .get(&db)
            .ok_or_else(|| EngineError::unknown_handle("DB", db.get()))?
            .name;
        self.tables
            .get_mut(name)
            .ok_or_else(|| EngineError::unknown_handle("DB", db.get()))
    }

    fn iterator_mut(&mut self, iterator: IteratorHandle) -> EngineResult<&mut MemoryIterator> {
        self.iterators
            .get_mut(&iterator)
            .ok_or_else(|| EngineError::unknown_handle("iterator", iterator.get()))
    }
}

/// In-memory engine implementing the bridge contract.
///
/// # Example
///
/// ```ignore
/// let engine = Arc::new(MemoryEngine::new());
/// engine.fail_next(EngineOp::Batch, EngineError::new("E_BATCH_OPERATION_ERROR", "boom"));
/// ```
#[derive(Default)]
pub struct MemoryEngine {
    inner: Mutex<Inner>,
    max_read: Option<usize>,
}

impl MemoryEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Never return more than `max_read` entries from one `read_iterator`
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = Some(max_read.max(1));
        self
    }

    /// Make the next call of `op` fail with `err`.
    ///
    /// Failures queue up: calling this twice fails the next two calls.
    pub fn fail_next(&self, op: EngineOp, err: EngineError) {
        self.inner
            .lock()
            .failpoints
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Number of calls of `op` so far, including failed ones
    pub fn calls(&self, op: EngineOp) -> usize {
        self.inner.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of open database handles
    pub fn open_databases(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Number of live iterator handles
    pub fn open_iterators(&self) -> usize {
        self.inner.lock().iterators.len()
    }

    /// Encoded contents of the database `name`, in key order
    pub fn contents(&self, name: &str) -> Option<Vec<(String, String)>> {
        self.inner
            .lock()
            .tables
            .get(name)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Release every database and iterator handle.
    ///
    /// Called when the host tears down the bridge so a later open of the same
    /// database is not blocked by stale handles. Tables are kept.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        let (dbs, iterators) = (inner.open.len(), inner.iterators.len());
        inner.iterators.clear();
        inner.open.clear();
        if dbs + iterators > 0 {
            warn!(dbs, iterators, "closed all engine handles");
        }
    }

    fn open_sync(
        &self,
        db: DbHandle,
        name: &str,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Open)?;
        if inner.open.contains_key(&db) {
            return Err(EngineError::new(
                codes::ALREADY_OPEN,
                format!("DB with handle {} already open", db.get()),
            ));
        }
        let exists = inner.tables.contains_key(name);
        if exists && error_if_exists {
            return Err(EngineError::new(
                codes::OPEN_ERROR,
                format!("Error opening database {}: database exists", name),
            ));
        }
        if !exists && !create_if_missing {
            return Err(EngineError::new(
                codes::OPEN_ERROR,
                format!("Error opening database {}: database does not exist", name),
            ));
        }
        inner.tables.entry(name.to_string()).or_default();
        inner.open.insert(
            db,
            OpenDatabase {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    fn put_sync(&self, db: DbHandle, key: &str, value: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Put)?;
        inner
            .table_mut(db)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_sync(&self, db: DbHandle, key: &str) -> EngineResult<Option<String>> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Get)?;
        Ok(inner.table_mut(db)?.get(key).cloned())
    }

    fn del_sync(&self, db: DbHandle, key: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Del)?;
        inner.table_mut(db)?.remove(key);
        Ok(())
    }

    fn batch_sync(&self, db: DbHandle, ops: Vec<EncodedBatchOp>) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Batch)?;
        let table = inner.table_mut(db)?;
        for op in ops {
            match op {
                EncodedBatchOp::Put { key, value } => {
                    table.insert(key, value);
                }
                EncodedBatchOp::Del { key } => {
                    table.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear_sync(&self, db: DbHandle, range: EncodedRange) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Clear)?;
        let table = inner.table_mut(db)?;
        let mut doomed: Vec<String> = table
            .keys()
            .filter(|k| range.contains(k))
            .cloned()
            .collect();
        if range.reverse {
            doomed.reverse();
        }
        let limit = range
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        for key in doomed.into_iter().take(limit) {
            table.remove(&key);
        }
        Ok(())
    }

    fn close_sync(&self, db: DbHandle) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::Close)?;
        if inner.open.remove(&db).is_none() {
            return Err(EngineError::unknown_handle("DB", db.get()));
        }
        inner.iterators.retain(|_, it| it.db != db);
        Ok(())
    }

    fn create_iterator_sync(
        &self,
        db: DbHandle,
        iterator: IteratorHandle,
        spec: IteratorSpec,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::CreateIterator)?;
        if inner.iterators.contains_key(&iterator) {
            return Err(EngineError::new(
                codes::ALREADY_INITIALIZED,
                format!("Already created iterator with handle {}", iterator.get()),
            ));
        }
        let table = inner.table_mut(db)?;
        let mut entries: Vec<(String, String)> = table
            .iter()
            .filter(|(k, _)| spec.range.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if spec.range.reverse {
            entries.reverse();
        }
        inner.iterators.insert(
            iterator,
            MemoryIterator {
                db,
                entries,
                position: 0,
                steps: 0,
                spec,
            },
        );
        Ok(())
    }

    fn read_iterator_sync(&self, iterator: IteratorHandle, count: usize) -> EngineResult<ReadBatch> {
        let count = self.max_read.map_or(count, |max| count.min(max));
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::ReadIterator)?;
        Ok(inner.iterator_mut(iterator)?.read(count))
    }

    fn seek_iterator_sync(&self, iterator: IteratorHandle, target: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::SeekIterator)?;
        inner.iterator_mut(iterator)?.seek(target);
        Ok(())
    }

    fn end_iterator_sync(&self, iterator: IteratorHandle) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.enter(EngineOp::EndIterator)?;
        inner
            .iterators
            .remove(&iterator)
            .map(|_| ())
            .ok_or_else(|| EngineError::unknown_handle("iterator", iterator.get()))
    }
}

// Every call yields once before doing its work so callers observe a real
// suspension point, as they would across the bridge.
#[async_trait]
impl Engine for MemoryEngine {
    async fn open(
        &self,
        db: DbHandle,
        name: &str,
        create_if_missing: bool,
        error_if_exists: bool,
    ) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.open_sync(db, name, create_if_missing, error_if_exists)
    }

    async fn put(&self, db: DbHandle, key: &str, value: &str, _sync: bool) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.put_sync(db, key, value)
    }

    async fn get(&self, db: DbHandle, key: &str) -> EngineResult<Option<String>> {
        tokio::task::yield_now().await;
        self.get_sync(db, key)
    }

    async fn del(&self, db: DbHandle, key: &str, _sync: bool) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.del_sync(db, key)
    }

    async fn batch(&self, db: DbHandle, ops: Vec<EncodedBatchOp>) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.batch_sync(db, ops)
    }

    async fn clear(&self, db: DbHandle, range: EncodedRange) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.clear_sync(db, range)
    }

    async fn close(&self, db: DbHandle) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.close_sync(db)
    }

    async fn create_iterator(
        &self,
        db: DbHandle,
        iterator: IteratorHandle,
        spec: IteratorSpec,
    ) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.create_iterator_sync(db, iterator, spec)
    }

    async fn read_iterator(
        &self,
        iterator: IteratorHandle,
        count: usize,
    ) -> EngineResult<ReadBatch> {
        tokio::task::yield_now().await;
        self.read_iterator_sync(iterator, count)
    }

    async fn seek_iterator(&self, iterator: IteratorHandle, target: &str) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.seek_iterator_sync(iterator, target)
    }

    async fn end_iterator(&self, iterator: IteratorHandle) -> EngineResult<()> {
        tokio::task::yield_now().await;
        self.end_iterator_sync(iterator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: DbHandle = DbHandle::new(1);
    const IT: IteratorHandle = IteratorHandle::new(1 << 32);

    fn spec(range: EncodedRange) -> IteratorSpec {
        IteratorSpec {
            range,
            keys: true,
            values: true,
        }
    }

    fn engine_with(keys: &[&str]) -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.open_sync(DB, "test", true, false).unwrap();
        for k in keys {
            engine.put_sync(DB, k, &format!("v{}", k)).unwrap();
        }
        engine
    }

    fn read_keys(engine: &MemoryEngine, count: usize) -> Vec<String> {
        engine
            .read_iterator_sync(IT, count)
            .unwrap()
            .keys
            .unwrap_or_default()
    }

    #[test]
    fn test_open_flags() {
        let engine = MemoryEngine::new();
        let err = engine.open_sync(DB, "missing", false, false).unwrap_err();
        assert_eq!(err.code, codes::OPEN_ERROR);

        engine.open_sync(DB, "db", true, false).unwrap();
        let err = engine.open_sync(DB, "db", true, false).unwrap_err();
        assert_eq!(err.code, codes::ALREADY_OPEN);

        let err = engine
            .open_sync(DbHandle::new(2), "db", true, true)
            .unwrap_err();
        assert_eq!(err.code, codes::OPEN_ERROR);
    }

    #[test]
    fn test_tables_survive_close() {
        let engine = engine_with(&["61"]);
        engine.close_sync(DB).unwrap();
        engine.open_sync(DbHandle::new(2), "test", false, false).unwrap();
        assert_eq!(
            engine.get_sync(DbHandle::new(2), "61").unwrap(),
            Some("v61".to_string())
        );
    }

    #[test]
    fn test_unknown_handle() {
        let engine = MemoryEngine::new();
        let err = engine.get_sync(DB, "61").unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_HANDLE);
        let err = engine.read_iterator_sync(IT, 10).unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_HANDLE);
    }

    #[test]
    fn test_iterator_forward_and_reverse() {
        let engine = engine_with(&["63", "61", "62"]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        assert_eq!(read_keys(&engine, 10), vec!["61", "62", "63"]);
        assert_eq!(engine.read_iterator_sync(IT, 10).unwrap().read_count, 0);
        engine.end_iterator_sync(IT).unwrap();

        let reverse = EncodedRange {
            reverse: true,
            ..Default::default()
        };
        engine.create_iterator_sync(DB, IT, spec(reverse)).unwrap();
        assert_eq!(read_keys(&engine, 10), vec!["63", "62", "61"]);
    }

    #[test]
    fn test_iterator_bounds_and_limit() {
        let engine = engine_with(&["61", "62", "63", "64"]);
        let range = EncodedRange {
            gt: Some("61".to_string()),
            lte: Some("64".to_string()),
            limit: Some(2),
            ..Default::default()
        };
        engine.create_iterator_sync(DB, IT, spec(range)).unwrap();
        assert_eq!(read_keys(&engine, 1), vec!["62"]);
        assert_eq!(read_keys(&engine, 10), vec!["63"]);
        assert_eq!(engine.read_iterator_sync(IT, 10).unwrap().read_count, 0);
    }

    #[test]
    fn test_iterator_reads_from_snapshot() {
        let engine = engine_with(&["61"]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        engine.put_sync(DB, "62", "late").unwrap();
        assert_eq!(read_keys(&engine, 10), vec!["61"]);
    }

    #[test]
    fn test_seek_forward_and_reverse() {
        let engine = engine_with(&["61", "62", "63"]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        assert_eq!(read_keys(&engine, 10).len(), 3);
        engine.seek_iterator_sync(IT, "62").unwrap();
        assert_eq!(read_keys(&engine, 10), vec!["62", "63"]);
        engine.end_iterator_sync(IT).unwrap();

        let reverse = EncodedRange {
            reverse: true,
            ..Default::default()
        };
        engine.create_iterator_sync(DB, IT, spec(reverse)).unwrap();
        engine.seek_iterator_sync(IT, "6250").unwrap();
        assert_eq!(read_keys(&engine, 10), vec!["62", "61"]);
    }

    #[test]
    fn test_seek_outside_range_exhausts() {
        let engine = engine_with(&["61", "62", "63"]);
        let range = EncodedRange {
            gte: Some("62".to_string()),
            ..Default::default()
        };
        engine.create_iterator_sync(DB, IT, spec(range)).unwrap();
        engine.seek_iterator_sync(IT, "61").unwrap();
        assert_eq!(engine.read_iterator_sync(IT, 10).unwrap().read_count, 0);
    }

    #[test]
    fn test_keys_only_iterator_omits_values() {
        let engine = engine_with(&["61"]);
        let keys_only = IteratorSpec {
            range: EncodedRange::default(),
            keys: true,
            values: false,
        };
        engine.create_iterator_sync(DB, IT, keys_only).unwrap();
        let batch = engine.read_iterator_sync(IT, 10).unwrap();
        assert_eq!(batch.read_count, 1);
        assert!(batch.values.is_none());
    }

    #[test]
    fn test_max_read_produces_short_batches() {
        let engine = engine_with(&["61", "62", "63"]).with_max_read(2);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        assert_eq!(engine.read_iterator_sync(IT, 100).unwrap().read_count, 2);
        assert_eq!(engine.read_iterator_sync(IT, 100).unwrap().read_count, 1);
        assert_eq!(engine.read_iterator_sync(IT, 100).unwrap().read_count, 0);
    }

    #[test]
    fn test_duplicate_iterator_handle() {
        let engine = engine_with(&[]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        let err = engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap_err();
        assert_eq!(err.code, codes::ALREADY_INITIALIZED);
    }

    #[test]
    fn test_close_releases_iterators() {
        let engine = engine_with(&["61"]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        engine.close_sync(DB).unwrap();
        assert_eq!(engine.open_iterators(), 0);
        assert_eq!(engine.open_databases(), 0);
    }

    #[test]
    fn test_clear_with_reverse_limit() {
        let engine = engine_with(&["61", "62", "63", "64"]);
        let range = EncodedRange {
            gte: Some("62".to_string()),
            reverse: true,
            limit: Some(2),
            ..Default::default()
        };
        engine.clear_sync(DB, range).unwrap();
        let keys: Vec<String> = engine
            .contents("test")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["61", "62"]);
    }

    #[test]
    fn test_failpoint_fires_once_and_counts() {
        let engine = engine_with(&[]);
        engine.fail_next(EngineOp::Put, EngineError::new(codes::PUT_ERROR, "boom"));
        let err = engine.put_sync(DB, "61", "1").unwrap_err();
        assert_eq!(err.code, codes::PUT_ERROR);
        assert!(engine.put_sync(DB, "61", "1").is_ok());
        assert_eq!(engine.calls(EngineOp::Put), 2);
    }

    #[test]
    fn test_failed_batch_applies_nothing() {
        let engine = engine_with(&["61"]);
        engine.fail_next(
            EngineOp::Batch,
            EngineError::new(codes::BATCH_OPERATION_ERROR, "boom"),
        );
        let ops = vec![
            EncodedBatchOp::Del {
                key: "61".to_string(),
            },
            EncodedBatchOp::Put {
                key: "64".to_string(),
                value: "4".to_string(),
            },
        ];
        assert!(engine.batch_sync(DB, ops).is_err());
        assert_eq!(engine.get_sync(DB, "61").unwrap(), Some("v61".to_string()));
        assert_eq!(engine.get_sync(DB, "64").unwrap(), None);
    }

    #[test]
    fn test_close_all() {
        let engine = engine_with(&["61"]);
        engine
            .create_iterator_sync(DB, IT, spec(EncodedRange::default()))
            .unwrap();
        engine.close_all();
        assert_eq!(engine.open_databases(), 0);
        assert_eq!(engine.open_iterators(), 0);
        assert!(engine.contents("test").is_some());
    }
}
