//! Engine bridge for bridgekv
//!
//! The storage engine is external and only reachable through an
//! asynchronous, string-only bridge. This crate defines:
//! - [`Engine`]: the bridge contract, one async method per engine primitive
//! - Wire types: [`EncodedBatchOp`], [`EncodedRange`], [`IteratorSpec`], [`ReadBatch`]
//! - [`EngineProxy`]: the traced, validated call surface the store uses
//! - [`MemoryEngine`]: an in-process reference engine for tests and embedding

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod memory;
pub mod proxy;

pub use bridge::{EncodedBatchOp, EncodedRange, Engine, EngineResult, IteratorSpec, ReadBatch};
pub use memory::{EngineOp, MemoryEngine};
pub use proxy::EngineProxy;
