//! Buffered iterator over an engine cursor.
//!
//! `read_iterator` costs a bridge round trip, so entries are fetched in
//! batches and handed out one per [`StoreIterator::next`] from a FIFO buffer.
//!
//! ## State machine
//!
//! ```text
//!            next() with empty buffer
//!   Idle ───────────────────────────────▶ Fetching
//!    ▲  ◀── read_count > 0 or failure ──────┘ │
//!    │                                         │ read_count == 0
//!    │ seek()                                  ▼
//!    └──────────────────────────────────── Exhausted
//!
//!   any state ── end() ──▶ Ended
//! ```
//!
//! Only `read_count == 0` means exhaustion. A short batch just means the
//! engine had fewer entries ready; the next call reads again.
//!
//! A batch is decoded entry by entry. Entries before the first undecodable
//! one are buffered and delivered; after them every `next()` fails with the
//! same protocol error until the iterator is repositioned with `seek` or
//! ended. The engine has already moved past the batch, so carrying on would
//! skip entries silently.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use bridgekv_core::{BridgeCodec, CodecError, Entry, Error, IteratorHandle, Payload, Result};
use bridgekv_engine::{EngineProxy, ReadBatch};

use crate::options::IteratorOptions;
use crate::scheduler::DeliveryScheduler;

/// Iterator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// No fetch in flight; the engine may have more entries
    Idle,
    /// A `read_iterator` call is outstanding
    Fetching,
    /// The engine reported no more entries
    Exhausted,
    /// `end()` was called; terminal
    Ended,
}

/// Settings an iterator needs beyond its handle.
pub(crate) struct IteratorParams {
    pub(crate) read_batch_size: usize,
    pub(crate) drain_budget: usize,
    pub(crate) live: Arc<AtomicUsize>,
    /// Count of completed closes of the owning store
    pub(crate) closes: Arc<AtomicU64>,
}

/// Cursor over a store, created by [`Store::iterator`](crate::Store::iterator).
///
/// Call [`end`](StoreIterator::end) when done and await it to completion.
/// Dropping an iterator that was not ended leaves its engine handle open
/// until the store closes.
pub struct StoreIterator {
    proxy: EngineProxy,
    codec: Arc<dyn BridgeCodec>,
    handle: IteratorHandle,
    state: IteratorState,
    // Created on first fetch; None also when that column was not requested.
    keys: Option<VecDeque<Payload>>,
    values: Option<VecDeque<Payload>>,
    queue_len: usize,
    pending_seek: Option<String>,
    // Decode failure reported once the entries before it are delivered.
    failed: Option<Error>,
    read_batch_size: usize,
    want_keys: bool,
    want_values: bool,
    key_as_bytes: bool,
    value_as_bytes: bool,
    scheduler: DeliveryScheduler,
    live: Arc<AtomicUsize>,
    closes: Arc<AtomicU64>,
    opened_at: u64,
}

impl StoreIterator {
    pub(crate) fn new(
        proxy: EngineProxy,
        codec: Arc<dyn BridgeCodec>,
        handle: IteratorHandle,
        options: &IteratorOptions,
        params: IteratorParams,
    ) -> Self {
        params.live.fetch_add(1, Ordering::SeqCst);
        let opened_at = params.closes.load(Ordering::SeqCst);
        Self {
            proxy,
            codec,
            handle,
            state: IteratorState::Idle,
            keys: None,
            values: None,
            queue_len: 0,
            pending_seek: None,
            failed: None,
            read_batch_size: params.read_batch_size,
            want_keys: options.keys,
            want_values: options.values,
            key_as_bytes: options.key_as_bytes,
            value_as_bytes: options.value_as_bytes,
            scheduler: DeliveryScheduler::new(params.drain_budget),
            live: params.live,
            closes: params.closes,
            opened_at,
        }
    }

    /// Engine handle of this iterator
    pub fn handle(&self) -> IteratorHandle {
        self.handle
    }

    /// Current state
    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Entries fetched but not yet delivered
    pub fn buffered(&self) -> usize {
        self.queue_len
    }

    /// Whether the engine reported the end of the range
    pub fn is_exhausted(&self) -> bool {
        self.state == IteratorState::Exhausted
    }

    /// Whether a decode failure blocks further reads until `seek` or `end`
    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    /// Times this iterator yielded to the runtime while draining its buffer
    pub fn scheduler_yields(&self) -> u64 {
        self.scheduler.yields()
    }

    /// Deliver the next entry, or `None` at the end of the range.
    ///
    /// # Errors
    ///
    /// - `Error::State` if the iterator has ended or its store was closed
    /// - `Error::Engine` if a seek or read failed; nothing was consumed and
    ///   the call may be repeated
    /// - `Error::Protocol` / `Error::MalformedResponse` if the engine sent
    ///   data that cannot be decoded; repeated until `seek` or `end`
    pub async fn next(&mut self) -> Result<Option<Entry>> {
        match self.state {
            IteratorState::Ended => return Err(Error::state("iterator has ended")),
            IteratorState::Fetching => {
                warn!(iterator = %self.handle, "previous next() was cancelled mid-fetch");
                self.state = IteratorState::Idle;
            }
            IteratorState::Idle | IteratorState::Exhausted => {}
        }
        self.ensure_store_open()?;

        if let Some(target) = self.pending_seek.as_deref() {
            self.proxy.seek_iterator(self.handle, target).await?;
            self.pending_seek = None;
            self.scheduler.suspended();
        }

        if self.queue_len > 0 {
            self.scheduler.before_delivery().await;
            return Ok(Some(self.pop()));
        }
        if let Some(err) = self.failed.as_ref() {
            return Err(err.clone());
        }
        if self.state == IteratorState::Exhausted {
            return Ok(None);
        }

        self.fetch().await?;
        if self.queue_len > 0 {
            return Ok(Some(self.pop()));
        }
        match self.failed.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(None),
        }
    }

    /// Reposition the iterator at `target`.
    ///
    /// Buffered entries and any decode failure are discarded and the next
    /// [`next`](Self::next) starts from the first entry at or after `target`
    /// in iteration order (at or before it when reversed). The engine is
    /// told on that call.
    pub fn seek(&mut self, target: impl AsRef<[u8]>) -> Result<()> {
        if self.state == IteratorState::Ended {
            return Err(Error::state("cannot seek an ended iterator"));
        }
        self.ensure_store_open()?;
        self.clear_buffer();
        self.failed = None;
        self.pending_seek = Some(self.codec.encode_key(target.as_ref()));
        self.state = IteratorState::Idle;
        Ok(())
    }

    /// Release the engine handle.
    ///
    /// The iterator is ended once the engine call completes, even if it
    /// fails. A second call is a no-op. If the store was closed the engine
    /// already released the handle and no call is made.
    pub async fn end(&mut self) -> Result<()> {
        if self.state == IteratorState::Ended {
            return Ok(());
        }
        let released = if self.store_closed() {
            debug!(iterator = %self.handle, "store closed, handle already released");
            Ok(())
        } else {
            self.proxy.end_iterator(self.handle).await
        };
        self.state = IteratorState::Ended;
        self.clear_buffer();
        self.pending_seek = None;
        self.failed = None;
        self.live.fetch_sub(1, Ordering::SeqCst);
        released
    }

    /// Collect every remaining entry, then end the iterator.
    ///
    /// On a read failure the iterator is still ended and the read error is
    /// returned.
    pub async fn all(mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let collected = loop {
            match self.next().await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let ended = self.end().await;
        collected?;
        ended?;
        Ok(entries)
    }

    fn store_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) != self.opened_at
    }

    fn ensure_store_open(&self) -> Result<()> {
        if self.store_closed() {
            return Err(Error::state("store was closed; iterator is no longer valid"));
        }
        Ok(())
    }

    async fn fetch(&mut self) -> Result<()> {
        self.state = IteratorState::Fetching;
        let read = self
            .proxy
            .read_iterator(
                self.handle,
                self.read_batch_size,
                self.want_keys,
                self.want_values,
            )
            .await;
        self.state = IteratorState::Idle;
        let batch = read?;
        self.scheduler.suspended();

        if batch.is_exhausted() {
            debug!(iterator = %self.handle, "iterator exhausted");
            self.state = IteratorState::Exhausted;
            return Ok(());
        }
        self.enqueue(batch);
        Ok(())
    }

    /// Buffer entries in order up to the first one that fails to decode.
    fn enqueue(&mut self, batch: ReadBatch) {
        let codec = Arc::clone(&self.codec);
        let mut keys = self.want_keys.then_some(batch.keys).flatten().map(Vec::into_iter);
        let mut values = self
            .want_values
            .then_some(batch.values)
            .flatten()
            .map(Vec::into_iter);

        for position in 0..batch.read_count {
            let entry = decode_one(
                keys.as_mut().and_then(Iterator::next),
                |s| codec.decode_key(s),
                self.key_as_bytes,
            )
            .and_then(|key| {
                let value = decode_one(
                    values.as_mut().and_then(Iterator::next),
                    |s| codec.decode_value(s),
                    self.value_as_bytes,
                )?;
                Ok((key, value))
            });
            match entry {
                Ok((key, value)) => {
                    if let Some(key) = key {
                        self.keys.get_or_insert_with(VecDeque::new).push_back(key);
                    }
                    if let Some(value) = value {
                        self.values.get_or_insert_with(VecDeque::new).push_back(value);
                    }
                    self.queue_len += 1;
                }
                Err(e) => {
                    warn!(
                        iterator = %self.handle,
                        position,
                        read_count = batch.read_count,
                        error = %e,
                        "undecodable entry in read batch"
                    );
                    self.failed = Some(e.into());
                    break;
                }
            }
        }
    }

    fn pop(&mut self) -> Entry {
        self.queue_len -= 1;
        Entry {
            key: self.keys.as_mut().and_then(VecDeque::pop_front),
            value: self.values.as_mut().and_then(VecDeque::pop_front),
        }
    }

    fn clear_buffer(&mut self) {
        if let Some(keys) = self.keys.as_mut() {
            keys.clear();
        }
        if let Some(values) = self.values.as_mut() {
            values.clear();
        }
        self.queue_len = 0;
    }
}

fn decode_one<F>(
    raw: Option<String>,
    decode: F,
    as_bytes: bool,
) -> std::result::Result<Option<Payload>, CodecError>
where
    F: Fn(&str) -> std::result::Result<Vec<u8>, CodecError>,
{
    raw.map(|s| decode(&s).map(|bytes| Payload::from_decoded(bytes, as_bytes)))
        .transpose()
}

impl Drop for StoreIterator {
    fn drop(&mut self) {
        if self.state != IteratorState::Ended {
            warn!(iterator = %self.handle, "iterator dropped without end()");
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl fmt::Debug for StoreIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreIterator")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("buffered", &self.queue_len)
            .field("pending_seek", &self.pending_seek)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
