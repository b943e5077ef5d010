//! Common types shared across the cache subsystem.
//!
//! This module provides the building blocks used by every other component:
//! 1. **Word Geometry:** Byte/word width constants for the 32-bit data path.
//! 2. **Error Handling:** Construction-time configuration errors.

/// Configuration error definitions.
pub mod error;

pub use error::ConfigError;

/// Bytes per bus word (32-bit data path).
pub const WORD_BYTES: u32 = 4;

/// Maximum words per cache line supported by the line buffer.
pub const MAX_LINE_WORDS: usize = 32;
