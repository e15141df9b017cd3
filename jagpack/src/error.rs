//! Error types for package encoding and decoding

use thiserror::Error;

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("package truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("entry {index} overruns the package: offset {offset} + {len} > {available}")]
    EntryOutOfBounds {
        index: usize,
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("BZip2 decompression failed: {0}")]
    Decompress(String),

    #[error("BZip2 compression failed: {0}")]
    Compress(String),

    #[error("slot {index} out of range for a bundle of {capacity} entries")]
    SlotOutOfRange { index: usize, capacity: usize },

    #[error("{value} does not fit the {field} field")]
    FieldOverflow { field: &'static str, value: usize },
}
