//! Store adapter for bridgekv
//!
//! Presents an ordered, byte-safe key-value store on top of an engine that
//! only speaks strings:
//! - [`Store`]: open/close, put/get/delete, atomic batches, range clear
//! - [`StoreIterator`]: buffered cursor with seek and explicit end
//! - [`WriteBatch`]: chained batch builder
//! - [`StoreConfig`]: TOML configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod iterator;
pub mod options;
pub mod scheduler;
pub mod store;

pub use batch::WriteBatch;
pub use config::StoreConfig;
pub use iterator::{IteratorState, StoreIterator};
pub use options::{
    BatchOp, IteratorOptions, OpenOptions, RangeOptions, ReadOptions, WriteOptions,
};
pub use scheduler::{DeliveryMode, DeliveryScheduler};
pub use store::{Store, StoreStatus};

/// Options accepted by [`Store::clear`]
pub type ClearOptions = RangeOptions;
