//! Deflate-family compression of the reassembled payload
//!
//! Payloads are written as zlib streams (2-byte header + adler32 trailer).
//! Some producers emitted headerless deflate, so decompression tries zlib
//! first and then raw deflate, and nothing else.

use cdna_core::{CdnaError, CdnaResult};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Default zlib level
pub const DEFAULT_LEVEL: u32 = 6;

/// Which framing a payload turned out to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Zlib,
    RawDeflate,
}

/// Compress `data` into a zlib stream.
pub fn compress(data: &[u8], level: u32) -> CdnaResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(level.min(9)),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib stream, falling back to raw deflate.
pub fn decompress(data: &[u8]) -> CdnaResult<Vec<u8>> {
    decompress_with_framing(data).map(|(out, _)| out)
}

/// Like [`decompress`], also reporting which framing succeeded.
pub fn decompress_with_framing(data: &[u8]) -> CdnaResult<(Vec<u8>, Framing)> {
    let mut out = Vec::new();
    let zlib_err = match ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => return Ok((out, Framing::Zlib)),
        Err(e) => e,
    };
    tracing::debug!(error = %zlib_err, "zlib inflate failed, retrying as raw deflate");

    out.clear();
    match DeflateDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Ok((out, Framing::RawDeflate)),
        Err(raw_err) => Err(CdnaError::DecompressionFailed {
            zlib: zlib_err.to_string(),
            raw: raw_err.to_string(),
        }),
    }
}
