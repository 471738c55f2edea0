//! Error types for bcsr-spmm.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bcsr-spmm operations.
pub type Result<T> = std::result::Result<T, SpmmError>;

/// Errors that can abort an SpMM invocation.
///
/// Every variant is terminal for the invocation that produced it; nothing
/// in the crate retries.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SpmmError {
    /// A required operand or shape was not supplied.
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    /// An operand's extent disagrees with the declared shape.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which operand or dimension
        what: &'static str,
        /// Expected extent
        expected: usize,
        /// Actual extent
        actual: usize,
    },

    /// The BCSR arrays violate a structural invariant.
    #[error("invalid BCSR matrix: {0}")]
    InvalidBcsr(String),

    /// K is not a whole number of engine blocks.
    #[error("K={k} is not a multiple of the engine block width {cube_k}")]
    KNotAligned {
        /// Inner dimension
        k: usize,
        /// Block column width for the element type
        cube_k: usize,
    },

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bad command line for the host harness.
    #[error("usage: {0}")]
    Usage(String),

    /// A stage queue lost its peer, which only happens when another stage
    /// of the same core has already failed.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// A core's execution context panicked.
    #[error("core {0} panicked during execution")]
    CorePanicked(usize),

    /// Host file I/O failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SpmmError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
