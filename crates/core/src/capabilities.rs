//! Capability flags advertised to callers.

use serde::Serialize;

/// Features the adapter supports. Fixed for the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Keys are byte strings, not forced to text
    pub buffer_keys: bool,
    /// Iterators read from a point-in-time snapshot
    pub snapshots: bool,
    /// Writes survive a restart of the engine
    pub permanence: bool,
    /// Ordered iteration with `seek`
    pub seek: bool,
    /// Range clearing
    pub clear: bool,
    /// Atomic multi-operation batches
    pub batch: bool,
    /// Operations may be queued before `open` completes
    pub deferred_open: bool,
    /// `open` reports completion to the caller
    pub open_callback: bool,
    /// Operations are awaitable
    pub promises: bool,
    /// `open` honours `create_if_missing`
    pub create_if_missing: bool,
    /// `open` honours `error_if_exists`
    pub error_if_exists: bool,
}

impl Capabilities {
    /// Capabilities of a store backed by the engine bridge
    pub const BRIDGE: Capabilities = Capabilities {
        buffer_keys: true,
        snapshots: true,
        permanence: true,
        seek: true,
        clear: true,
        batch: true,
        deferred_open: false,
        open_callback: true,
        promises: true,
        create_if_missing: true,
        error_if_exists: true,
    };
}
