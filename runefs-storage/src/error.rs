//! Error types for block store operations

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive {0} has no index entry")]
    Missing(u16),

    #[error("index entry for archive {id} is invalid: size {size}, first block {first_block}")]
    BadIndexEntry { id: u16, size: u32, first_block: u32 },

    #[error("chain for archive {id} is corrupt at block {block}, chunk {chunk}")]
    ChainMismatch { id: u16, block: u32, chunk: u16 },

    #[error("archive of {0} bytes exceeds the 24-bit size field")]
    TooLarge(usize),
}

pub type Result<T> = std::result::Result<T, StoreError>;
