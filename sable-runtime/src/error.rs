//! Error types raised by the collection runtime.
//!
//! Every fallible operation returns [`Result`]; the interpreter unwinds the
//! current frame when one of these reaches it. Nothing is retried inside the
//! runtime, and no failed operation leaves a partially applied mutation
//! behind (destructed-reference scrubbing of the *sources* of a set
//! operation is the one documented exception).

use thiserror::Error;

/// Errors produced by collection operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A new or combined array would exceed the configured maximum size.
    #[error("array too large ({size} > {max})")]
    ArrayTooLarge {
        /// Requested element count.
        size: usize,
        /// Configured cap.
        max: usize,
    },

    /// A new or combined mapping would exceed the configured maximum size.
    #[error("mapping too large ({size} > {max} entries)")]
    MappingTooLarge {
        /// Requested half-entry count (keys + values).
        size: usize,
        /// Configured cap in half-entries.
        max: usize,
    },

    /// An insert would grow a mapping past the maximum even after compaction.
    #[error("mapping too large to grow")]
    MappingTooLargeToGrow,

    /// An array was indexed outside `[0, size)`.
    #[error("array index out of range ({index} not in 0..{size})")]
    IndexOutOfRange {
        /// Offending index.
        index: i64,
        /// Array size.
        size: usize,
    },

    /// An array subrange had `lo > hi + 1` or `hi >= size`.
    #[error("invalid array range ({lo}..={hi} of {size})")]
    InvalidRange {
        /// Lower bound.
        lo: i64,
        /// Upper bound.
        hi: i64,
        /// Array size.
        size: usize,
    },

    /// Two distinct mapping keys compared equal during a sort or merge.
    #[error("identical indices in mapping")]
    IdenticalIndices,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
