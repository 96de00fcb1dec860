//! Crate-level error type.
//!
//! Only construction-time contract violations surface as errors. Runtime
//! conditions that merely mean "nothing was hit" (degenerate transforms,
//! empty geometry, queries against an unbuilt tree) are reported as quiet
//! no-hit results instead.

use thiserror::Error;

/// Errors raised when input geometry buffers violate the constructor
/// contract.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The index buffer length is not a multiple of the primitive arity
    /// (3 for triangles, 2 for line segments).
    #[error("index buffer length {len} is not a multiple of {arity}")]
    MalformedIndices {
        /// Actual index buffer length.
        len: usize,
        /// Indices per primitive.
        arity: usize,
    },

    /// An index refers past the end of the position buffer.
    #[error("vertex index {index} out of range for {count} positions")]
    IndexOutOfRange {
        /// The offending index value.
        index: u32,
        /// Number of positions available.
        count: usize,
    },
}

/// Result type for octree construction.
pub type Result<T> = std::result::Result<T, Error>;
