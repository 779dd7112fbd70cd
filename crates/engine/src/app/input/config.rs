use std::collections::BTreeMap;

use serde::Deserialize;

use crate::app::config::{require_positive, ConfigError};

pub const DEFAULT_BUFFER_SIZE: usize = 32;
pub const MAX_BUFFER_SIZE: usize = 128;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: f64 = 1000.0;
pub const DEFAULT_MAX_INPUTS_PER_WINDOW: usize = 100;
pub const DEFAULT_CLEANUP_INTERVAL_MS: f64 = 5000.0;
pub const DEFAULT_STALE_PRESS_THRESHOLD_MS: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub buffer_size: usize,
    pub enable_rate_limiting: bool,
    pub rate_limit_window_ms: f64,
    pub max_inputs_per_window: usize,
    pub cleanup_interval_ms: f64,
    pub stale_press_threshold_ms: f64,
    /// Merged over the built-in mappings; an action listed here replaces the
    /// default key set for that action.
    pub key_mappings: BTreeMap<String, Vec<String>>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            enable_rate_limiting: true,
            rate_limit_window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            max_inputs_per_window: DEFAULT_MAX_INPUTS_PER_WINDOW,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            stale_press_threshold_ms: DEFAULT_STALE_PRESS_THRESHOLD_MS,
            key_mappings: BTreeMap::new(),
        }
    }
}

impl InputConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::BufferSize {
                value: self.buffer_size,
                max: MAX_BUFFER_SIZE,
            });
        }
        require_positive("rate_limit_window_ms", self.rate_limit_window_ms)?;
        if self.max_inputs_per_window == 0 {
            return Err(ConfigError::TooSmall {
                field: "max_inputs_per_window",
                value: 0.0,
                min: 1.0,
            });
        }
        require_positive("cleanup_interval_ms", self.cleanup_interval_ms)?;
        require_positive("stale_press_threshold_ms", self.stale_press_threshold_ms)?;

        for (action, keys) in &self.key_mappings {
            if !keys.iter().any(|key| is_valid_key_identifier(key)) {
                return Err(ConfigError::EmptyMapping {
                    action: action.clone(),
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn is_valid_key_identifier(key: &str) -> bool {
    !key.trim().is_empty()
}
