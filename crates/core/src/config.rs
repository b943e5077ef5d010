//! Configuration for the cache subsystem.
//!
//! This module defines the construction parameters of the component. It provides:
//! 1. **Defaults:** Baseline geometry constants for both caches and the write buffer.
//! 2. **Structures:** Per-cache geometry and the top-level subsystem configuration.
//! 3. **Validation:** One-shot geometry checks that are fatal at construction.
//!
//! Configuration is either built in code (`XcacheConfig::default()`) or
//! deserialized from JSON (the trace runner does this).

use serde::Deserialize;

use crate::common::{ConfigError, MAX_LINE_WORDS};

/// Default configuration constants.
///
/// These values define the baseline geometry when not explicitly overridden.
mod defaults {
    /// Maximum number of sets per cache.
    pub const MAX_SETS: usize = 1024;

    /// Maximum associativity.
    pub const MAX_WAYS: usize = 8;

    /// Default number of sets (instruction and data).
    pub const CACHE_SETS: usize = 64;

    /// Default associativity (instruction and data).
    pub const CACHE_WAYS: usize = 4;

    /// Default words per line (32 bytes).
    pub const CACHE_WORDS: usize = 8;

    /// Default write buffer depth.
    pub const WBUF_DEPTH: usize = 8;

    /// Default number of consecutive external snoop hits tolerated before
    /// the controller escalates to a full flush.
    pub const SNOOP_FLUSH_THRESHOLD: u32 = 4;
}

/// Geometry of one set-associative cache.
///
/// All three parameters must be powers of two; sets ≤ 1024, ways ≤ 8,
/// words ≤ 32. Violations are fatal at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheGeometry {
    /// Number of sets.
    #[serde(default = "CacheGeometry::default_sets")]
    pub sets: usize,

    /// Number of associative ways per set.
    #[serde(default = "CacheGeometry::default_ways")]
    pub ways: usize,

    /// Number of 32-bit words per line.
    #[serde(default = "CacheGeometry::default_words")]
    pub words: usize,
}

impl CacheGeometry {
    /// Returns the default number of sets.
    fn default_sets() -> usize {
        defaults::CACHE_SETS
    }

    /// Returns the default associativity.
    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    /// Returns the default words per line.
    fn default_words() -> usize {
        defaults::CACHE_WORDS
    }

    /// Line size in bytes.
    #[inline]
    pub fn line_bytes(&self) -> usize {
        self.words * 4
    }

    /// Total cache capacity in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.sets * self.ways * self.line_bytes()
    }

    /// Checks this geometry against the architectural bounds.
    ///
    /// `params` carries the per-cache parameter names used in error reports.
    fn validate(&self, params: [&'static str; 3]) -> Result<(), ConfigError> {
        let checks = [
            (params[0], self.sets, defaults::MAX_SETS),
            (params[1], self.ways, defaults::MAX_WAYS),
            (params[2], self.words, MAX_LINE_WORDS),
        ];
        for (param, value, max) in checks {
            if value == 0 {
                return Err(ConfigError::Zero { param });
            }
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { param, value });
            }
            if value > max {
                return Err(ConfigError::TooLarge { param, value, max });
            }
        }
        Ok(())
    }
}

impl Default for CacheGeometry {
    fn default() -> Self {
        Self {
            sets: defaults::CACHE_SETS,
            ways: defaults::CACHE_WAYS,
            words: defaults::CACHE_WORDS,
        }
    }
}

/// Top-level configuration of the cache subsystem.
///
/// # Examples
///
/// Deserializing from JSON (typical trace-runner usage):
///
/// ```
/// use xcache_core::config::XcacheConfig;
///
/// let json = r#"{
///     "icache": { "sets": 8, "ways": 2, "words": 4 },
///     "dcache": { "sets": 8, "ways": 4, "words": 4 },
///     "wbuf_depth": 2,
///     "snoop_active": true
/// }"#;
///
/// let config: XcacheConfig = serde_json::from_str(json).unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.dcache.ways, 4);
/// assert_eq!(config.snoop_flush_threshold, 4);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct XcacheConfig {
    /// Instruction cache geometry.
    #[serde(default)]
    pub icache: CacheGeometry,

    /// Data cache geometry.
    #[serde(default)]
    pub dcache: CacheGeometry,

    /// Write buffer depth (entries).
    #[serde(default = "XcacheConfig::default_wbuf_depth")]
    pub wbuf_depth: usize,

    /// Whether the snoop-invalidate mechanism is active.
    #[serde(default = "XcacheConfig::default_snoop_active")]
    pub snoop_active: bool,

    /// Consecutive external snoop hits (with no intervening local data
    /// access) that trigger a full data-cache flush.
    #[serde(default = "XcacheConfig::default_flush_threshold")]
    pub snoop_flush_threshold: u32,
}

impl XcacheConfig {
    /// Returns the default write buffer depth.
    fn default_wbuf_depth() -> usize {
        defaults::WBUF_DEPTH
    }

    /// Snoop defaults to enabled, as in the reference platform.
    fn default_snoop_active() -> bool {
        true
    }

    /// Returns the default snoop flush escalation threshold.
    fn default_flush_threshold() -> u32 {
        defaults::SNOOP_FLUSH_THRESHOLD
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on non-power-of-two geometry, out-of-bound
    /// geometry, a zero-depth write buffer, or a zero flush threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.icache
            .validate(["icache sets", "icache ways", "icache words"])?;
        self.dcache
            .validate(["dcache sets", "dcache ways", "dcache words"])?;
        if self.wbuf_depth == 0 {
            return Err(ConfigError::Zero {
                param: "wbuf_depth",
            });
        }
        if self.snoop_flush_threshold == 0 {
            return Err(ConfigError::Zero {
                param: "snoop_flush_threshold",
            });
        }
        Ok(())
    }
}

impl Default for XcacheConfig {
    fn default() -> Self {
        Self {
            icache: CacheGeometry::default(),
            dcache: CacheGeometry::default(),
            wbuf_depth: defaults::WBUF_DEPTH,
            snoop_active: true,
            snoop_flush_threshold: defaults::SNOOP_FLUSH_THRESHOLD,
        }
    }
}
