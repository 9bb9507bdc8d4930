//! Content-addressed chunk store
//!
//! Chunks are written at `{prefix}/chunks/{hash}` and never rewritten: `put`
//! skips the write when the address already exists. Two concurrent puts of
//! the same bytes may both write; the object is byte-identical either way, so
//! the last writer winning is harmless.

use opendal::Operator;
use tracing::debug;

use cdna_chunks::{hash_bytes, ContentHash};
use cdna_core::{CdnaResult, HashAlgorithm, RecordKind};

use crate::layout::Layout;
use crate::storage_error;

/// Whether a put created a new object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    Deduplicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    pub hash: ContentHash,
    pub outcome: PutOutcome,
}

/// Deduplicating chunk store over an OpenDAL operator. Cheap to clone.
#[derive(Clone)]
pub struct ContentStore {
    op: Operator,
    layout: Layout,
    algorithm: HashAlgorithm,
}

impl ContentStore {
    pub fn new(op: Operator, layout: Layout, algorithm: HashAlgorithm) -> Self {
        Self {
            op,
            layout,
            algorithm,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Hash `data` and store it under that hash unless already present.
    pub async fn put(&self, data: &[u8]) -> CdnaResult<PutResult> {
        let hash = hash_bytes(self.algorithm, data);
        let key = self.layout.chunk(&hash);

        if self.contains(&hash).await? {
            debug!(hash = %hash, "dedup: chunk already stored");
            return Ok(PutResult {
                hash,
                outcome: PutOutcome::Deduplicated,
            });
        }

        self.op
            .write(&key, data.to_vec())
            .await
            .map_err(|e| storage_error(RecordKind::Chunk, &key, e))?;
        debug!(hash = %hash, bytes = data.len(), "chunk stored");

        Ok(PutResult {
            hash,
            outcome: PutOutcome::Stored,
        })
    }

    /// Fetch a chunk by hash. Absence is `NotFound`, not a storage failure.
    pub async fn get(&self, hash: &ContentHash) -> CdnaResult<Vec<u8>> {
        let key = self.layout.chunk(hash);
        let buf = self
            .op
            .read(&key)
            .await
            .map_err(|e| storage_error(RecordKind::Chunk, &key, e))?;
        Ok(buf.to_vec())
    }

    pub async fn contains(&self, hash: &ContentHash) -> CdnaResult<bool> {
        let key = self.layout.chunk(hash);
        self.op
            .exists(&key)
            .await
            .map_err(|e| storage_error(RecordKind::Chunk, &key, e))
    }
}
