// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Converter configuration loaded from environment variables.

use citygml_lite_geometry::OffsetStrategy;

/// Converter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of worker threads for parallel geometry building.
    pub worker_threads: usize,
    /// Conversion deadline in seconds (0 = none).
    pub convert_timeout_secs: u64,
    /// Planarity tolerance in source units.
    pub planarity_tolerance: f64,
    /// How the global offset is computed.
    pub offset_strategy: OffsetStrategy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            worker_threads: lookup("WORKER_THREADS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or_else(num_cpus::get),
            convert_timeout_secs: lookup("CONVERT_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            planarity_tolerance: lookup("PLANARITY_TOLERANCE")
                .and_then(|v| v.trim().parse().ok())
                .filter(|t: &f64| t.is_finite() && *t >= 0.0)
                .unwrap_or(0.05),
            offset_strategy: lookup("OFFSET_STRATEGY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
