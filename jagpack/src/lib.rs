//! Archive package codec for classic game-cache file systems.
//!
//! A package is a single blob holding a directory-like collection of
//! named entries, located by a 32-bit hash of the upper-cased entry
//! name. Either the whole package footer is one BZip2 stream, or each
//! entry body is its own BZip2 stream ("per-entry" compression).
//!
//! [`Package`] decodes a blob and serves entries on demand, with an
//! optional eager unpack; [`Bundle`] assembles entries slot by slot and
//! packs them into a blob once.

pub mod bundle;
pub mod compress;
pub mod error;
pub mod hash;
pub mod package;

pub use bundle::Bundle;
pub use error::{Error, Result};
pub use hash::entry_name_hash;
pub use package::Package;
