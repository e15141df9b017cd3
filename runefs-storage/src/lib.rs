//! Block-chained archive store used by classic game-cache file systems.
//!
//! An archive is an opaque blob addressed by a numeric id. Blobs are
//! persisted across two flat files: an index file of dense 6-byte records
//! and a main file of 520-byte blocks chained through per-block headers.
//! Every block header carries back-references (owning archive, chunk
//! position, owning index) that are validated while walking a chain and
//! preserved when a chain is rewritten in place, so a torn or foreign
//! write is detected as absence instead of being served as corrupt data.

pub mod error;
pub mod layout;
pub mod store;

pub use error::{Result, StoreError};
pub use layout::{BlockHeader, IndexEntry};
pub use store::BlockStore;
