//! bridgekv - byte-safe ordered key-value store over a string-only engine bridge
//!
//! The storage engine lives on the far side of an asynchronous bridge that
//! only carries text. bridgekv encodes keys and values so arbitrary bytes
//! survive the trip and key order is kept, and turns the engine's chunked
//! cursor into a buffered iterator.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridgekv::{IteratorOptions, MemoryEngine, OpenOptions, Store};
//!
//! let store = Store::new("users", Arc::new(MemoryEngine::new()))?;
//! store.open(OpenOptions::default()).await?;
//! store.put("user:123", "Alice").await?;
//!
//! let mut it = store.iterator(IteratorOptions::default()).await?;
//! while let Some(entry) = it.next().await? {
//!     println!("{:?}", entry);
//! }
//! it.end().await?;
//! ```
//!
//! # Architecture
//!
//! - `bridgekv-core`: codec, errors, handles, payloads
//! - `bridgekv-engine`: the [`Engine`] bridge contract, [`EngineProxy`] and
//!   the in-memory reference engine
//! - `bridgekv-store`: [`Store`], [`StoreIterator`] and configuration

pub use bridgekv_core::*;
pub use bridgekv_engine::*;
pub use bridgekv_store::*;
