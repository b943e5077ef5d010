//! Construction-time error definitions.
//!
//! Only illegal configuration is a Rust-level error in this crate. Runtime
//! bus errors are part of the normal response contract (see
//! [`crate::proc::DataResponse`] and [`crate::proc::InstResponse`]) and are
//! never surfaced through `Result`.

use thiserror::Error;

/// Fatal configuration errors detected once, at construction.
///
/// Geometry violations cannot be recovered at runtime: every address
/// decomposition in the cache arrays assumes power-of-two sets, ways, and
/// words-per-line within the architectural bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A geometry parameter is not a power of two.
    #[error("{param} must be a power of two (got {value})")]
    NotPowerOfTwo {
        /// Name of the offending parameter.
        param: &'static str,
        /// The rejected value.
        value: usize,
    },

    /// A geometry parameter exceeds its architectural bound.
    #[error("{param} must be at most {max} (got {value})")]
    TooLarge {
        /// Name of the offending parameter.
        param: &'static str,
        /// The rejected value.
        value: usize,
        /// The architectural maximum.
        max: usize,
    },

    /// A parameter that must be non-zero was zero.
    #[error("{param} must be at least 1")]
    Zero {
        /// Name of the offending parameter.
        param: &'static str,
    },
}
