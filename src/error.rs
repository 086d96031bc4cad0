//! Error types for the indexed cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache and store operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store could not be reached or refused the operation
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A record could not be encoded for storage
    #[error("failed to encode record for key '{key}'")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored bytes do not decode to a valid record.
    ///
    /// Distinct from a miss: the key exists but its payload is corrupt.
    #[error("stored bytes under key '{key}' do not decode to a record")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A secondary-index value contains the reserved separator byte.
    ///
    /// Raised before any write happens; storing such a member would corrupt
    /// range-scan results for every subsequent reader of the index.
    #[error("value {value:?} for index '{index}' contains the reserved separator byte")]
    SeparatorViolation { index: String, value: String },

    /// A `warm` batch failed partway through.
    ///
    /// The first `committed` records of the input are in the cache; nothing
    /// is rolled back.
    #[error("warm stopped after {committed} records were written")]
    PartialWarm {
        committed: usize,
        #[source]
        source: Box<CacheError>,
    },
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
