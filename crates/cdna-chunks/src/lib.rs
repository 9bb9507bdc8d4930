//! cdna-chunks: fixed-size chunking, content hashing, and deflate compression
//!
//! # Overview
//! - `hash`: SHA-512/256 or BLAKE3 digests (content identity, CAS key)
//! - `chunker`: fixed-offset splitting of an async stream with a running file hash
//! - `deflate`: zlib compression with a raw-deflate decompression fallback

pub mod chunker;
pub mod deflate;
pub mod hash;

// Convenience re-exports for the most common operations
pub use chunker::{chunk_slice, Chunk, FixedChunker, StreamChunk};
pub use deflate::{compress, decompress, decompress_with_framing, Framing};
pub use hash::{hash_bytes, ContentHash, ContentHasher};
