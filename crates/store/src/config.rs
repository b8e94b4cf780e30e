//! Store configuration via TOML
//!
//! Every field has a default, so an empty document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use bridgekv_core::codec::{get_codec, DEFAULT_CODEC_ID};
use bridgekv_core::{Error, Result};

/// Entries requested per `read_iterator` call by default.
pub const DEFAULT_READ_BATCH_SIZE: usize = 100;

/// Upper bound on `read_batch_size`, capping memory and bridge payload size.
pub const MAX_READ_BATCH_SIZE: usize = 10_000;

/// Buffered deliveries allowed per scheduled turn by default.
pub const DEFAULT_DRAIN_BUDGET: usize = 100;

/// Configuration for a [`Store`](crate::Store).
///
/// # Example
///
/// ```toml
/// # Entries fetched per bridge round trip (1..=10000)
/// read_batch_size = 100
///
/// # Buffered entries delivered before an iterator yields to the runtime
/// drain_budget = 100
///
/// # Wire format shared with the engine
/// codec = "ordered-v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Entries requested per `read_iterator` call
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,
    /// Buffered deliveries per scheduled turn
    #[serde(default = "default_drain_budget")]
    pub drain_budget: usize,
    /// Codec identifier
    #[serde(default = "default_codec")]
    pub codec: String,
}

fn default_read_batch_size() -> usize {
    DEFAULT_READ_BATCH_SIZE
}

fn default_drain_budget() -> usize {
    DEFAULT_DRAIN_BUDGET
}

fn default_codec() -> String {
    DEFAULT_CODEC_ID.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_batch_size: default_read_batch_size(),
            drain_budget: default_drain_budget(),
            codec: default_codec(),
        }
    }
}

impl StoreConfig {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an out-of-range batch size, a zero drain
    /// budget or an unknown codec.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_READ_BATCH_SIZE).contains(&self.read_batch_size) {
            return Err(Error::config(format!(
                "read_batch_size must be between 1 and {}, got {}",
                MAX_READ_BATCH_SIZE, self.read_batch_size
            )));
        }
        if self.drain_budget == 0 {
            return Err(Error::config("drain_budget must be at least 1"));
        }
        get_codec(&self.codec).map_err(|e| Error::config(e.to_string()))?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# bridgekv store configuration
#
# Entries fetched per bridge round trip while iterating (1..=10000).
read_batch_size = 100

# Buffered entries an iterator delivers before yielding to the runtime.
drain_budget = 100

# Wire format shared with the engine. "ordered-v1" is the only format.
codec = "ordered-v1"
"#
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }
}
