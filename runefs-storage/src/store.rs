//! Block-chained archive store over a pair of random-access files.

use crate::error::{Result, StoreError};
use crate::layout::{
    BlockHeader, IndexEntry, BLOCK_HEADER_SIZE, BLOCK_PAYLOAD_SIZE, BLOCK_SIZE, INDEX_ENTRY_SIZE,
    MAX_ARCHIVE_SIZE,
};
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, trace};

/// Maps numeric archive ids to opaque blobs over two backing files: a
/// dense index of 6-byte records and a main file of 520-byte chained
/// blocks.
///
/// The store takes ownership of two already-opened file handles; any
/// `Read + Write + Seek` type works ([`std::fs::File`] in production,
/// an in-memory cursor in tests). All operations, including the whole
/// two-phase [`BlockStore::put`], are serialized under an internal
/// lock, so the store is freely shareable across threads when the file
/// type is `Send`.
pub struct BlockStore<F> {
    index_id: u8,
    inner: Mutex<Inner<F>>,
}

struct Inner<F> {
    main_file: F,
    index_file: F,
    /// Reusable scratch for one block, header plus payload.
    scratch: [u8; BLOCK_SIZE],
}

impl<F: Read + Write + Seek> BlockStore<F> {
    /// Create a store over already-opened main and index files.
    pub fn new(index_id: u8, main_file: F, index_file: F) -> Self {
        Self {
            index_id,
            inner: Mutex::new(Inner {
                main_file,
                index_file,
                scratch: [0; BLOCK_SIZE],
            }),
        }
    }

    /// The 8-bit tag stamped into every block this store writes.
    pub fn index_id(&self) -> u8 {
        self.index_id
    }

    /// Read the archive stored under `archive_id`.
    ///
    /// A missing index record, a failed chain validation, and an IO
    /// failure are each reported as their own error kind.
    pub fn read(&self, archive_id: u16) -> Result<Vec<u8>> {
        self.inner.lock().read_chain(self.index_id, archive_id)
    }

    /// Read an archive, conflating every failure with absence.
    pub fn get(&self, archive_id: u16) -> Option<Vec<u8>> {
        match self.read(archive_id) {
            Ok(data) => Some(data),
            Err(err) => {
                debug!("get({archive_id}) failed: {err}");
                None
            }
        }
    }

    /// Write `src` as the archive stored under `archive_id`.
    ///
    /// First attempts to rewrite the existing chain in place, validating
    /// every reused block's back-references; if the recorded chain is
    /// missing or fails validation at any point, falls back to appending
    /// a fresh chain at the end of the main file. Blocks orphaned by a
    /// shrinking rewrite are not reclaimed.
    pub fn write(&self, archive_id: u16, src: &[u8]) -> Result<()> {
        if src.len() > MAX_ARCHIVE_SIZE {
            return Err(StoreError::TooLarge(src.len()));
        }
        let mut inner = self.inner.lock();
        match inner.write_chain(self.index_id, archive_id, src, true) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!("rewrite of archive {archive_id} failed ({err}), appending fresh chain");
                inner.write_chain(self.index_id, archive_id, src, false)
            }
        }
    }

    /// Write an archive, reporting success as a bare boolean.
    pub fn put(&self, archive_id: u16, src: &[u8]) -> bool {
        match self.write(archive_id, src) {
            Ok(()) => true,
            Err(err) => {
                debug!("put({archive_id}) failed: {err}");
                false
            }
        }
    }

    /// Consume the store, dropping both file handles.
    pub fn close(self) {}
}

impl<F: Read + Write + Seek> Inner<F> {
    fn main_len(&mut self) -> io::Result<u64> {
        self.main_file.seek(SeekFrom::End(0))
    }

    /// First block number at or past the end of the main file, never 0.
    fn end_block(&mut self) -> Result<u32> {
        let len = self.main_len()?;
        let block = len.div_ceil(BLOCK_SIZE as u64) as u32;
        Ok(block.max(1))
    }

    fn read_index_entry(&mut self, archive_id: u16) -> Result<IndexEntry> {
        self.index_file.seek(SeekFrom::Start(
            INDEX_ENTRY_SIZE as u64 * u64::from(archive_id),
        ))?;
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        match self.index_file.read_exact(&mut buf) {
            Ok(()) => Ok(IndexEntry::from_bytes(&buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StoreError::Missing(archive_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_chain(&mut self, index_id: u8, archive_id: u16) -> Result<Vec<u8>> {
        let entry = self.read_index_entry(archive_id)?;
        let size = entry.size as usize;
        if size == 0 {
            // A zero-length archive has no chain to walk; its recorded
            // first block may never have been written.
            return Ok(Vec::new());
        }
        let max_block = self.main_len()? / BLOCK_SIZE as u64;
        if entry.first_block == 0 || u64::from(entry.first_block) > max_block {
            return Err(StoreError::BadIndexEntry {
                id: archive_id,
                size: entry.size,
                first_block: entry.first_block,
            });
        }

        let mut data = vec![0u8; size];
        let mut written = 0usize;
        let mut block = entry.first_block;
        let mut chunk: u16 = 0;
        while written < size {
            if block == 0 {
                return Err(StoreError::ChainMismatch {
                    id: archive_id,
                    block,
                    chunk,
                });
            }
            let payload_len = (size - written).min(BLOCK_PAYLOAD_SIZE);
            let read_len = BLOCK_HEADER_SIZE + payload_len;
            self.main_file
                .seek(SeekFrom::Start(BLOCK_SIZE as u64 * u64::from(block)))?;
            self.main_file.read_exact(&mut self.scratch[..read_len])?;

            let mut header_bytes = [0u8; BLOCK_HEADER_SIZE];
            header_bytes.copy_from_slice(&self.scratch[..BLOCK_HEADER_SIZE]);
            let header = BlockHeader::from_bytes(&header_bytes);
            if header.archive_id != archive_id
                || header.chunk != chunk
                || header.index_id != index_id
                || u64::from(header.next_block) > max_block
            {
                return Err(StoreError::ChainMismatch {
                    id: archive_id,
                    block,
                    chunk,
                });
            }

            data[written..written + payload_len]
                .copy_from_slice(&self.scratch[BLOCK_HEADER_SIZE..read_len]);
            written += payload_len;
            block = header.next_block;
            chunk += 1;
        }
        trace!("read archive {archive_id}: {size} bytes in {chunk} blocks");
        Ok(data)
    }

    fn write_chain(
        &mut self,
        index_id: u8,
        archive_id: u16,
        src: &[u8],
        reuse: bool,
    ) -> Result<()> {
        let mut reuse = reuse;
        let block = if reuse {
            let entry = self.read_index_entry(archive_id)?;
            let max_block = self.main_len()? / BLOCK_SIZE as u64;
            if entry.first_block == 0 || u64::from(entry.first_block) > max_block {
                return Err(StoreError::BadIndexEntry {
                    id: archive_id,
                    size: entry.size,
                    first_block: entry.first_block,
                });
            }
            entry.first_block
        } else {
            self.end_block()?
        };

        let entry = IndexEntry {
            size: src.len() as u32,
            first_block: block,
        };
        self.index_file.seek(SeekFrom::Start(
            INDEX_ENTRY_SIZE as u64 * u64::from(archive_id),
        ))?;
        self.index_file.write_all(&entry.to_bytes())?;

        let mut block = block;
        let mut written = 0usize;
        let mut chunk: u16 = 0;
        while written < src.len() {
            let mut next_block = if reuse {
                self.read_reused_header(index_id, archive_id, block, chunk)?
            } else {
                0
            };
            if next_block == 0 {
                // End of the pre-existing chain: append the remaining
                // chunks at the end of the main file.
                reuse = false;
                next_block = self.end_block()?;
                if next_block == block {
                    next_block += 1;
                }
            }
            if src.len() - written <= BLOCK_PAYLOAD_SIZE {
                next_block = 0;
            }

            let header = BlockHeader {
                archive_id,
                chunk,
                next_block,
                index_id,
            };
            let payload_len = (src.len() - written).min(BLOCK_PAYLOAD_SIZE);
            self.main_file
                .seek(SeekFrom::Start(BLOCK_SIZE as u64 * u64::from(block)))?;
            self.main_file.write_all(&header.to_bytes())?;
            self.main_file.write_all(&src[written..written + payload_len])?;

            written += payload_len;
            block = next_block;
            chunk += 1;
        }
        trace!("wrote archive {archive_id}: {} bytes in {chunk} blocks", src.len());
        Ok(())
    }

    /// Read the header of a block about to be reused. Returns the
    /// chain's next block, or 0 when the block lies past the end of the
    /// file. A header that does not reference back to
    /// `(archive_id, chunk, index_id)`, or whose next pointer is out of
    /// range, fails the whole reuse pass.
    fn read_reused_header(
        &mut self,
        index_id: u8,
        archive_id: u16,
        block: u32,
        chunk: u16,
    ) -> Result<u32> {
        self.main_file
            .seek(SeekFrom::Start(BLOCK_SIZE as u64 * u64::from(block)))?;
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        match self.main_file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
            Err(e) => return Err(e.into()),
        }
        let header = BlockHeader::from_bytes(&buf);
        if header.archive_id != archive_id || header.chunk != chunk || header.index_id != index_id
        {
            return Err(StoreError::ChainMismatch {
                id: archive_id,
                block,
                chunk,
            });
        }
        let max_block = self.main_len()? / BLOCK_SIZE as u64;
        if u64::from(header.next_block) > max_block {
            return Err(StoreError::ChainMismatch {
                id: archive_id,
                block,
                chunk,
            });
        }
        Ok(header.next_block)
    }
}
