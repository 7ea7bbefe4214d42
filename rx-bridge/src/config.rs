//! Bridge configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default label used in log lines
pub const DEFAULT_NAME: &str = "observable-iterator";

/// Default depth of the buffered-outcome queue that triggers a warning
pub const DEFAULT_BUFFER_WARN_THRESHOLD: usize = 1024;

/// Configuration for an [`ObservableAsyncIterator`](crate::ObservableAsyncIterator)
///
/// None of these settings change delivery semantics. The producer is never
/// slowed down; the threshold only controls when the bridge complains about a
/// consumer falling behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Label attached to every log line emitted by the bridge
    pub name: String,
    /// Buffered-outcome depth at which a warning is logged (0 disables)
    pub buffer_warn_threshold: usize,
}

impl BridgeConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label used in log lines
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the buffered-outcome warning threshold
    pub fn with_buffer_warn_threshold(mut self, threshold: usize) -> Self {
        self.buffer_warn_threshold = threshold;
        self
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML document
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            buffer_warn_threshold: DEFAULT_BUFFER_WARN_THRESHOLD,
        }
    }
}
