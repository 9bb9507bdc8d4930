//! Fixed-size chunking
//!
//! Splits a byte stream at fixed offsets: every chunk is exactly
//! `chunk_size` bytes except the last, which may be shorter. The whole-file
//! hash is accumulated over the stream as it is read, so it never depends on
//! where the chunk boundaries fall.

use cdna_core::{CdnaError, CdnaResult, HashAlgorithm};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::hash::{hash_bytes, ContentHash, ContentHasher};

/// A single fixed-size chunk
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based position within the file
    pub index: u64,
    /// Byte offset within the source file
    pub offset: u64,
    /// Chunk length in bytes
    pub length: usize,
    /// Hash of this chunk's data
    pub hash: ContentHash,
}

/// A chunk read off a stream, still holding its bytes
#[derive(Debug)]
pub struct StreamChunk {
    pub index: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Pulls fixed-size chunks from an async reader while hashing the full stream.
pub struct FixedChunker<R> {
    reader: R,
    chunk_size: usize,
    file_hasher: ContentHasher,
    offset: u64,
    index: u64,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FixedChunker<R> {
    pub fn new(reader: R, chunk_size: u64, algorithm: HashAlgorithm) -> CdnaResult<Self> {
        if chunk_size == 0 {
            return Err(CdnaError::Config("chunk size must be greater than zero".into()));
        }
        let chunk_size = usize::try_from(chunk_size)
            .map_err(|_| CdnaError::Config(format!("chunk size {chunk_size} too large")))?;
        Ok(Self {
            reader,
            chunk_size,
            file_hasher: ContentHasher::new(algorithm),
            offset: 0,
            index: 0,
            eof: false,
        })
    }

    /// Read the next chunk. Returns `None` once the stream is exhausted; an
    /// empty stream yields no chunks at all.
    pub async fn next_chunk(&mut self) -> CdnaResult<Option<StreamChunk>> {
        if self.eof {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.eof = true;
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        if buf.is_empty() {
            return Ok(None);
        }

        self.file_hasher.update(&buf);
        let chunk = StreamChunk {
            index: self.index,
            offset: self.offset,
            data: buf,
        };
        self.index += 1;
        self.offset += filled as u64;
        Ok(Some(chunk))
    }

    /// Bytes consumed so far
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Consume the chunker, returning the whole-stream hash and total size.
    pub fn finish(self) -> (ContentHash, u64) {
        (self.file_hasher.finalize(), self.offset)
    }
}

/// Split an in-memory slice into fixed-size chunks. Useful for testing.
pub fn chunk_slice(data: &[u8], chunk_size: usize, algorithm: HashAlgorithm) -> Vec<Chunk> {
    data.chunks(chunk_size.max(1))
        .enumerate()
        .map(|(i, c)| Chunk {
            index: i as u64,
            offset: (i * chunk_size.max(1)) as u64,
            length: c.len(),
            hash: hash_bytes(algorithm, c),
        })
        .collect()
}
