//! BZip2 stream helpers

use crate::error::{Error, Result};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{Read, Write};
use tracing::trace;

/// Compress `data` into a fresh BZip2 stream.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compress(e.to_string()))?;
    let out = encoder.finish().map_err(|e| Error::Compress(e.to_string()))?;
    trace!("bzip2 compress: {} bytes -> {} bytes", data.len(), out.len());
    Ok(out)
}

/// Decompress a complete BZip2 stream.
///
/// `size_hint` is the expected decompressed length; it only sizes the
/// output buffer, the stream itself decides how many bytes come out.
pub fn decompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint);
    BzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    trace!("bzip2 decompress: {} bytes -> {} bytes", data.len(), out.len());
    Ok(out)
}
