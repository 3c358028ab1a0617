//! Configuration types for aimsync

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_WINDOW_MS;

/// Main configuration for the pairing/time-sync service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port the sync endpoint listens on
    pub port: u16,
    /// Pairing window length in milliseconds
    pub window_ms: u32,
    /// Address the HTTP listener binds to
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 80,
            window_ms: DEFAULT_WINDOW_MS,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set pairing window length
    pub fn with_window_ms(mut self, window_ms: u32) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Builder pattern: set bind address
    pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = bind_addr.into();
        self
    }
}
