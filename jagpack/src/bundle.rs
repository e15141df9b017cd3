//! Bundle encoder: assembles named entries and packs them into a blob

use crate::compress;
use crate::error::{Error, Result};
use crate::hash::entry_name_hash;
use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

/// Largest value a 24-bit size field can carry.
const MAX_U24: usize = 0xFF_FFFF;

/// Size of the outer package header.
const HEADER_SIZE: usize = 6;

struct Slot {
    name_hash: i32,
    uncompressed_size: u32,
    compressed_size: u32,
    /// Already BZip2-compressed unless the whole bundle is compressed
    /// at pack time.
    payload: Vec<u8>,
}

/// Write-side counterpart of [`crate::Package`]: a fixed-capacity slot
/// table, filled with [`Bundle::put`] and emitted once with
/// [`Bundle::pack`].
pub struct Bundle {
    wholly_compressed: bool,
    slots: Vec<Option<Slot>>,
    active: usize,
    total_compressed: usize,
}

impl Bundle {
    /// Create a bundle with `capacity` slots.
    ///
    /// When `wholly_compressed` the packed footer becomes a single
    /// BZip2 stream; otherwise each entry body is compressed
    /// individually as it is stored.
    pub fn new(capacity: usize, wholly_compressed: bool) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            wholly_compressed,
            slots,
            active: 0,
            total_compressed: 0,
        }
    }

    /// Number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Whether the packed footer will be one BZip2 stream.
    pub fn is_wholly_compressed(&self) -> bool {
        self.wholly_compressed
    }

    /// Store an entry at `index` under `name`, replacing any previous
    /// occupant of the slot. Records the payload's true length as the
    /// entry's uncompressed size alongside the stored (possibly
    /// compressed) length.
    pub fn put(&mut self, index: usize, name: &str, payload: &[u8]) -> Result<()> {
        if index >= self.slots.len() {
            return Err(Error::SlotOutOfRange {
                index,
                capacity: self.slots.len(),
            });
        }
        if payload.len() > MAX_U24 {
            return Err(Error::FieldOverflow {
                field: "24-bit entry size",
                value: payload.len(),
            });
        }
        let name_hash = entry_name_hash(name);
        let uncompressed_size = payload.len() as u32;
        let stored = if self.wholly_compressed {
            payload.to_vec()
        } else {
            compress::compress(payload)?
        };
        if stored.len() > MAX_U24 {
            return Err(Error::FieldOverflow {
                field: "24-bit entry size",
                value: stored.len(),
            });
        }

        if let Some(old) = self.slots[index].take() {
            self.total_compressed -= old.payload.len();
        } else {
            self.active += 1;
        }
        self.total_compressed += stored.len();
        self.slots[index] = Some(Slot {
            name_hash,
            uncompressed_size,
            compressed_size: stored.len() as u32,
            payload: stored,
        });
        Ok(())
    }

    /// Clear the slot at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if let Some(old) = slot.take() {
            self.active -= 1;
            self.total_compressed -= old.payload.len();
        }
    }

    /// Pack the occupied slots into a blob.
    ///
    /// The footer carries the entry count, the 10-byte metadata records
    /// in slot order, then the entry bodies in the same order. The
    /// 6-byte outer header records the footer's size before and after
    /// whole-bundle compression; equal sizes mean the footer is in the
    /// clear.
    pub fn pack(&self) -> Result<Vec<u8>> {
        if self.active > usize::from(u16::MAX) {
            return Err(Error::FieldOverflow {
                field: "16-bit entry count",
                value: self.active,
            });
        }
        let footer_len = 2 + self.active * 10 + self.total_compressed;
        if footer_len > MAX_U24 {
            return Err(Error::FieldOverflow {
                field: "24-bit footer size",
                value: footer_len,
            });
        }

        let mut footer = Vec::with_capacity(footer_len);
        footer.write_u16::<BigEndian>(self.active as u16)?;
        for slot in self.slots.iter().flatten() {
            footer.write_i32::<BigEndian>(slot.name_hash)?;
            footer.write_u24::<BigEndian>(slot.uncompressed_size)?;
            footer.write_u24::<BigEndian>(slot.compressed_size)?;
        }
        for slot in self.slots.iter().flatten() {
            footer.extend_from_slice(&slot.payload);
        }

        let uncompressed_size = footer.len();
        let footer = if self.wholly_compressed {
            compress::compress(&footer)?
        } else {
            footer
        };
        if footer.len() > MAX_U24 {
            return Err(Error::FieldOverflow {
                field: "24-bit footer size",
                value: footer.len(),
            });
        }

        let mut blob = Vec::with_capacity(HEADER_SIZE + footer.len());
        blob.write_u24::<BigEndian>(uncompressed_size as u32)?;
        blob.write_u24::<BigEndian>(footer.len() as u32)?;
        blob.extend_from_slice(&footer);
        debug!("packed bundle: {} entries, {} bytes", self.active, blob.len());
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_bookkeeping() {
        let mut bundle = Bundle::new(3, false);
        assert_eq!(bundle.active_count(), 0);

        bundle.put(0, "A", b"one").unwrap();
        bundle.put(2, "B", b"two").unwrap();
        assert_eq!(bundle.active_count(), 2);

        // Replacing a slot does not change the count.
        bundle.put(0, "C", b"three").unwrap();
        assert_eq!(bundle.active_count(), 2);

        bundle.remove(0);
        assert_eq!(bundle.active_count(), 1);

        // Clearing an empty or out-of-range slot is a no-op.
        bundle.remove(0);
        bundle.remove(7);
        assert_eq!(bundle.active_count(), 1);
    }

    #[test]
    fn rejects_out_of_range_slot() {
        let mut bundle = Bundle::new(1, false);
        assert!(matches!(
            bundle.put(1, "A", b"x"),
            Err(Error::SlotOutOfRange { index: 1, capacity: 1 })
        ));
    }
}
