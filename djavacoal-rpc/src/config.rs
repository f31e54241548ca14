//! Configuration for the RPC layer.
//!
//! # Example
//! ```rust,ignore
//! use djavacoal_rpc::RpcConfig;
//!
//! let config = RpcConfig::new()
//!     .with_max_input_size(512 * 1024)
//!     .with_debug_logging(true);
//! ```

use serde::{Deserialize, Serialize};

/// Layer configuration with defaults that work out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Maximum input JSON size in bytes (default: 1MB)
    pub max_input_size: usize,
    /// Emit a debug-level trace per dispatch (default: false)
    pub debug_logging: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_input_size: 1024 * 1024, // 1MB
            debug_logging: false,
        }
    }
}

impl RpcConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum input size in bytes.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Enable or disable debug logging.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }
}
