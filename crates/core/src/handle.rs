//! Handles and the handle registry
//!
//! Every engine call is correlated by an integer handle: one per opened
//! store and one per open iteration. Handles are unique for the lifetime of
//! a registry and assigned monotonically. Database handles live in
//! `[1, 2^32)`, iterator handles start at `2^32`, so the two can never
//! collide on the engine side.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// First database handle handed out by a fresh registry.
pub const DB_HANDLE_START: u64 = 1;

/// First iterator handle handed out by a fresh registry.
///
/// Also the exclusive upper bound of the database handle space.
pub const ITERATOR_HANDLE_START: u64 = 1 << 32;

/// Correlation id of an opened store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DbHandle(u64);

impl DbHandle {
    /// Wrap a raw handle value
    pub const fn new(raw: u64) -> Self {
        DbHandle(raw)
    }

    /// Raw handle value as sent over the bridge
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db#{}", self.0)
    }
}

/// Correlation id of an open iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IteratorHandle(u64);

impl IteratorHandle {
    /// Wrap a raw handle value
    pub const fn new(raw: u64) -> Self {
        IteratorHandle(raw)
    }

    /// Raw handle value as sent over the bridge
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IteratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "it#{}", self.0)
    }
}

static GLOBAL: Lazy<Arc<HandleRegistry>> = Lazy::new(|| Arc::new(HandleRegistry::new()));

/// Monotonic allocator for database and iterator handles.
///
/// Stores share the process-wide registry from [`HandleRegistry::global`]
/// unless they are given their own. Tests build a private registry (or call
/// [`reset`](HandleRegistry::reset)) so handle values are predictable.
#[derive(Debug)]
pub struct HandleRegistry {
    next_db: AtomicU64,
    next_iterator: AtomicU64,
}

impl HandleRegistry {
    /// Create a registry starting at the initial handle values
    pub fn new() -> Self {
        HandleRegistry {
            next_db: AtomicU64::new(DB_HANDLE_START),
            next_iterator: AtomicU64::new(ITERATOR_HANDLE_START),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<HandleRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Allocate the next database handle.
    ///
    /// Fails once the database handle space is used up rather than running
    /// into the iterator range.
    pub fn next_db_handle(&self) -> Result<DbHandle> {
        self.next_db
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < ITERATOR_HANDLE_START).then_some(n + 1)
            })
            .map(DbHandle)
            .map_err(|_| Error::state("database handle space exhausted"))
    }

    /// Allocate the next iterator handle
    pub fn next_iterator_handle(&self) -> IteratorHandle {
        IteratorHandle(self.next_iterator.fetch_add(1, Ordering::SeqCst))
    }

    /// Restore the initial counters.
    ///
    /// Only meaningful when no handle from this registry is still in use.
    pub fn reset(&self) {
        self.next_db.store(DB_HANDLE_START, Ordering::SeqCst);
        self.next_iterator.store(ITERATOR_HANDLE_START, Ordering::SeqCst);
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_handles_are_monotonic() {
        let registry = HandleRegistry::new();
        assert_eq!(registry.next_db_handle().unwrap(), DbHandle::new(1));
        assert_eq!(registry.next_db_handle().unwrap(), DbHandle::new(2));
        assert_eq!(registry.next_db_handle().unwrap(), DbHandle::new(3));
    }

    #[test]
    fn test_iterator_handles_start_above_db_range() {
        let registry = HandleRegistry::new();
        let first = registry.next_iterator_handle();
        let second = registry.next_iterator_handle();
        assert_eq!(first.get(), ITERATOR_HANDLE_START);
        assert_eq!(second.get(), ITERATOR_HANDLE_START + 1);
    }

    #[test]
    fn test_db_handle_space_exhaustion() {
        let registry = HandleRegistry::new();
        registry
            .next_db
            .store(ITERATOR_HANDLE_START - 1, Ordering::SeqCst);

        let last = registry.next_db_handle().unwrap();
        assert_eq!(last.get(), ITERATOR_HANDLE_START - 1);
        assert!(matches!(registry.next_db_handle(), Err(Error::State(_))));
    }

    #[test]
    fn test_reset_restores_counters() {
        let registry = HandleRegistry::new();
        registry.next_db_handle().unwrap();
        registry.next_iterator_handle();
        registry.reset();
        assert_eq!(registry.next_db_handle().unwrap().get(), DB_HANDLE_START);
        assert_eq!(registry.next_iterator_handle().get(), ITERATOR_HANDLE_START);
    }

    #[test]
    fn test_global_is_shared() {
        let a = HandleRegistry::global();
        let b = HandleRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_handles_are_unique_across_threads() {
        let registry = Arc::new(HandleRegistry::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| registry.next_iterator_handle().get())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(DbHandle::new(4).to_string(), "db#4");
        assert_eq!(IteratorHandle::new(9).to_string(), "it#9");
    }

    #[test]
    fn test_handle_serializes_as_integer() {
        let json = serde_json::to_string(&DbHandle::new(12)).unwrap();
        assert_eq!(json, "12");
    }
}
