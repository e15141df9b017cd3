//! Package decoder: parses a packed blob and serves named entries

use crate::compress;
use crate::error::{Error, Result};
use crate::hash::entry_name_hash;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::{debug, trace};

/// Size of the outer package header: two 24-bit footer sizes.
const HEADER_SIZE: usize = 6;

/// Size of one entry metadata record in the footer.
const ENTRY_META_SIZE: usize = 10;

/// Metadata for one named entry.
#[derive(Debug, Clone, Copy)]
struct EntryMeta {
    name_hash: i32,
    uncompressed_size: u32,
    compressed_size: u32,
    /// Offset of the entry body within the raw buffer.
    offset: usize,
}

/// A parsed package.
///
/// Entries are decompressed on demand until [`Package::unpack`] caches
/// them all eagerly and releases the packed form.
pub struct Package {
    wholly_compressed: bool,
    entries: Vec<EntryMeta>,
    raw: Vec<u8>,
    unpacked: Option<Vec<Vec<u8>>>,
}

impl Package {
    /// Parse a packed blob.
    ///
    /// The blob opens with the footer's uncompressed and compressed
    /// sizes. When they differ, the remainder is a single BZip2 stream
    /// holding the footer; when they match, the footer follows in the
    /// clear and each entry body is its own BZip2 stream.
    pub fn parse(src: Vec<u8>) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                expected: HEADER_SIZE,
                actual: src.len(),
            });
        }
        let mut cursor = Cursor::new(&src[..]);
        let uncompressed_size = cursor.read_u24::<BigEndian>()? as usize;
        let compressed_size = cursor.read_u24::<BigEndian>()? as usize;

        let (wholly_compressed, raw) = if compressed_size != uncompressed_size {
            let mut footer = compress::decompress(&src[HEADER_SIZE..], uncompressed_size)?;
            if footer.len() < uncompressed_size {
                return Err(Error::Truncated {
                    expected: uncompressed_size,
                    actual: footer.len(),
                });
            }
            footer.truncate(uncompressed_size);
            (true, footer)
        } else {
            (false, src)
        };

        // A decompressed footer starts at offset 0; in the clear it
        // still sits behind the 6-byte outer header.
        let base = if wholly_compressed { 0 } else { HEADER_SIZE };
        if raw.len() < base + 2 {
            return Err(Error::Truncated {
                expected: base + 2,
                actual: raw.len(),
            });
        }
        let mut cursor = Cursor::new(&raw[base..]);
        let amount = cursor.read_u16::<BigEndian>()? as usize;

        let meta_end = base + 2 + amount * ENTRY_META_SIZE;
        if raw.len() < meta_end {
            return Err(Error::Truncated {
                expected: meta_end,
                actual: raw.len(),
            });
        }

        let mut entries = Vec::with_capacity(amount);
        let mut offset = meta_end;
        for index in 0..amount {
            let name_hash = cursor.read_i32::<BigEndian>()?;
            let uncompressed_size = cursor.read_u24::<BigEndian>()?;
            let compressed_size = cursor.read_u24::<BigEndian>()?;
            let len = compressed_size as usize;
            if offset + len > raw.len() {
                return Err(Error::EntryOutOfBounds {
                    index,
                    offset,
                    len,
                    available: raw.len(),
                });
            }
            entries.push(EntryMeta {
                name_hash,
                uncompressed_size,
                compressed_size,
                offset,
            });
            offset += len;
        }

        debug!("parsed package: {amount} entries, wholly_compressed={wholly_compressed}");
        Ok(Self {
            wholly_compressed,
            entries,
            raw,
            unpacked: None,
        })
    }

    /// Number of entries in the package.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the footer was stored as a single BZip2 stream.
    pub fn is_wholly_compressed(&self) -> bool {
        self.wholly_compressed
    }

    /// Whether all entries have been eagerly unpacked.
    pub fn is_unpacked(&self) -> bool {
        self.unpacked.is_some()
    }

    /// Look up an entry by name.
    ///
    /// The name is hashed case-insensitively; the first entry whose
    /// hash matches wins, so a later colliding entry is unreachable.
    /// Returns `None` both when no entry matches and when the matching
    /// entry's body fails to decompress.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.get_by_hash(entry_name_hash(name))
    }

    /// Look up an entry by its precomputed name hash.
    pub fn get_by_hash(&self, name_hash: i32) -> Option<Vec<u8>> {
        let index = self.entries.iter().position(|e| e.name_hash == name_hash)?;
        match self.read_entry(index) {
            Ok(data) => Some(data),
            Err(err) => {
                debug!("entry with hash {name_hash} unreadable: {err}");
                None
            }
        }
    }

    /// Decompress and cache every entry, releasing the raw buffer.
    pub fn unpack(&mut self) -> Result<()> {
        if self.unpacked.is_some() {
            return Ok(());
        }
        let mut cache = Vec::with_capacity(self.entries.len());
        for index in 0..self.entries.len() {
            cache.push(self.read_entry(index)?);
        }
        self.unpacked = Some(cache);
        self.raw = Vec::new();
        Ok(())
    }

    fn read_entry(&self, index: usize) -> Result<Vec<u8>> {
        if let Some(cache) = &self.unpacked {
            return Ok(cache[index].clone());
        }
        let meta = &self.entries[index];
        let body = &self.raw[meta.offset..meta.offset + meta.compressed_size as usize];
        if self.wholly_compressed {
            // Bodies inside a wholly compressed footer are already in
            // the clear; their stored sizes coincide.
            let len = meta.uncompressed_size as usize;
            if len > body.len() {
                return Err(Error::EntryOutOfBounds {
                    index,
                    offset: meta.offset,
                    len,
                    available: self.raw.len(),
                });
            }
            Ok(body[..len].to_vec())
        } else {
            trace!(
                "decompressing entry {index}: {} -> {} bytes",
                meta.compressed_size,
                meta.uncompressed_size
            );
            compress::decompress(body, meta.uncompressed_size as usize)
        }
    }
}
