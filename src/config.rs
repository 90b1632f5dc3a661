//! Engine configuration
//!
//! Defaults for the time-travel subsystem. Values can be overridden from
//! the environment, mirroring how the rest of the crate is configured:
//!
//! | Variable                        | Field                   |
//! |---------------------------------|-------------------------|
//! | `EVENTLINE_WINDOW_SIZE`         | `window_size`           |
//! | `EVENTLINE_SPARSE_INTERVAL`     | `sparse_index_interval` |
//! | `EVENTLINE_CHECKPOINT_INTERVAL` | `checkpoint_interval`   |
//! | `EVENTLINE_MAX_CHECKPOINTS`     | `max_checkpoints`       |

use std::env;

use crate::error::{EngineError, EngineResult};

/// One sparse index entry is recorded every this many events
pub const DEFAULT_SPARSE_INDEX_INTERVAL: usize = 100;

/// Events kept materialized by a stepper's window
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// A stepper checkpoints every this many applied steps
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;

/// Upper bound on checkpoints held by one stepper
pub const DEFAULT_MAX_CHECKPOINTS: usize = 50;

/// Configuration for time-travel navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub window_size: usize,
    pub sparse_index_interval: usize,
    pub checkpoint_interval: usize,
    pub max_checkpoints: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sparse_index_interval: DEFAULT_SPARSE_INDEX_INTERVAL,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `EVENTLINE_*` environment variables
    ///
    /// Unset or unparseable variables keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        let defaults = Self::default();
        Self {
            window_size: read("EVENTLINE_WINDOW_SIZE", defaults.window_size),
            sparse_index_interval: read("EVENTLINE_SPARSE_INTERVAL", defaults.sparse_index_interval),
            checkpoint_interval: read("EVENTLINE_CHECKPOINT_INTERVAL", defaults.checkpoint_interval),
            max_checkpoints: read("EVENTLINE_MAX_CHECKPOINTS", defaults.max_checkpoints),
        }
    }

    /// Builder-style setter
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Builder-style setter
    pub fn with_sparse_index_interval(mut self, interval: usize) -> Self {
        self.sparse_index_interval = interval;
        self
    }

    /// Builder-style setter
    pub fn with_checkpoints(mut self, interval: usize, max: usize) -> Self {
        self.checkpoint_interval = interval;
        self.max_checkpoints = max;
        self
    }

    /// Reject zero-sized settings
    pub fn validate(&self) -> EngineResult<()> {
        let fields = [
            ("window_size", self.window_size),
            ("sparse_index_interval", self.sparse_index_interval),
            ("checkpoint_interval", self.checkpoint_interval),
            ("max_checkpoints", self.max_checkpoints),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(EngineError::InvalidArgument(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.sparse_index_interval, DEFAULT_SPARSE_INDEX_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides_and_falls_back() {
        let vars: HashMap<&str, &str> = [
            ("EVENTLINE_WINDOW_SIZE", "64"),
            ("EVENTLINE_CHECKPOINT_INTERVAL", "not-a-number"),
            ("EVENTLINE_MAX_CHECKPOINTS", " 8 "),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.window_size, 64);
        assert_eq!(config.checkpoint_interval, DEFAULT_CHECKPOINT_INTERVAL);
        assert_eq!(config.max_checkpoints, 8);
        assert_eq!(config.sparse_index_interval, DEFAULT_SPARSE_INDEX_INTERVAL);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = EngineConfig::default().with_window_size(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("window_size"));
    }
}
