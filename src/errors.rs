//! Crate-specific error types for file mappings.

use std::io;
use thiserror::Error;

/// Result alias for mapping operations.
pub type Result<T> = std::result::Result<T, MmapViewError>;

/// Error type covering mapping, flushing, bounds, and access-mode issues.
#[derive(Debug, Error)]
pub enum MmapViewError {
    /// Wrapper for `std::io::Error` outside the mapping calls themselves.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The OS rejected creating or releasing a mapping.
    #[error("mapping failed: {0}")]
    Mapping(#[source] io::Error),

    /// A forced flush of the mapped region failed.
    #[error("flush failed: {0}")]
    FlushFailed(#[source] io::Error),

    /// The requested size cannot be mapped into this address space.
    #[error("mapping size {size} exceeds the addressable range")]
    TooLarge {
        /// Requested size in bytes.
        size: u64,
    },

    /// Error returned when attempting an operation in an incompatible mode.
    #[error("invalid access mode: {0}")]
    InvalidMode(&'static str),

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Total size of the mapping.
        total: u64,
    },
}

impl MmapViewError {
    /// Native OS error code carried by this error, if any.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Io(e) | Self::Mapping(e) | Self::FlushFailed(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
