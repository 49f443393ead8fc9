//! Engine configuration and defaults
//!
//! All fields are optional in JSON; missing fields take the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::highlight::palette::Palette;

// =============================================================================
// Watcher timing
// =============================================================================

/// Timing parameters for the change watcher (milliseconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Debounce window for structural mutations. Default: 300
    pub mutation_debounce_ms: u64,
    /// Debounce window for content-area scrolling. Default: 150
    pub scroll_debounce_ms: u64,
    /// Longest a due scan may wait for an idle opportunity. Default: 500
    pub idle_timeout_ms: u64,
    /// Defer due scans to idle opportunities. Default: true
    pub use_idle_scheduling: bool,
    /// Delays after start for opportunistic re-scans. Default: [1000, 3000]
    pub opportunistic_delays_ms: Vec<u64>,
    /// How long a programmatic scroll suppresses scroll re-scans. Default: 1000
    pub scroll_suppression_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: 300,
            scroll_debounce_ms: 150,
            idle_timeout_ms: 500,
            use_idle_scheduling: true,
            opportunistic_delays_ms: vec![1000, 3000],
            scroll_suppression_ms: 1000,
        }
    }
}

// =============================================================================
// Engine configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub watcher: WatcherConfig,
    pub palette: Palette,
}

impl EngineConfig {
    /// Parse a JSON configuration object, defaulting missing fields
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
