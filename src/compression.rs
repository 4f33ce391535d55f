//! DEFLATE compression for archive payloads
//!
//! Entries are stored as raw DEFLATE streams. The `compressed_size` field in
//! the payload header doubles as the compression flag: zero means the bytes
//! are stored verbatim. Compression that fails to shrink a payload is
//! discarded and the entry stored raw.

use crate::error::{BoxError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress data into a raw DEFLATE stream.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a raw DEFLATE stream.
///
/// `expected_len` is the uncompressed size recorded in the payload header;
/// a mismatch means the entry is corrupt.
pub fn inflate(data: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    // expected_len comes from an untrusted header field; it is only a
    // capacity hint here and must not drive an unbounded allocation.
    let mut out = Vec::with_capacity(expected_len.min(64 * 1024) as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| BoxError::Decompression(e.to_string()))?;
    if out.len() as u64 != expected_len {
        return Err(BoxError::Decompression(format!(
            "expected {} bytes, got {}",
            expected_len,
            out.len()
        )));
    }
    Ok(out)
}

/// Compress an entry payload if beneficial.
///
/// Returns the bytes to store and the `compressed_size` to record (0 when
/// the payload is kept raw, either because compression was disabled or it
/// did not shrink the data).
pub fn compress_entry(data: &[u8], compress: bool) -> Result<(Vec<u8>, u64)> {
    if !compress {
        return Ok((data.to_vec(), 0));
    }
    let compressed = deflate(data)?;
    if compressed.len() < data.len() {
        let len = compressed.len() as u64;
        Ok((compressed, len))
    } else {
        Ok((data.to_vec(), 0))
    }
}
