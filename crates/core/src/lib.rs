//! Core types for bridgekv
//!
//! This crate defines the foundational pieces shared by the engine bridge and
//! the store adapter:
//! - Codec: byte-safe, order-preserving encoding for the string-only bridge
//! - Error: error taxonomy (protocol, engine, not found, state, config)
//! - Handles: database/iterator handles and the handle registry
//! - Payload: decoded keys and values returned to callers
//! - Capabilities: feature flags advertised by the store

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod handle;
pub mod payload;

pub use capabilities::Capabilities;
pub use codec::{get_codec, BridgeCodec, CodecError, OrderedCodec};
pub use error::{EngineError, Error, Result};
pub use handle::{DbHandle, HandleRegistry, IteratorHandle};
pub use payload::{Entry, Payload};
