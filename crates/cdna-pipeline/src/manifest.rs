//! File manifests: the ordered chunk list that reconstitutes a file
//!
//! A manifest is built once, while the upload streams through the chunker,
//! and stored at `{prefix}/manifests/{file_hash}.json`. The file hash is taken
//! over the original byte stream, independent of chunk boundaries.

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::debug;

use cdna_chunks::{ContentHash, FixedChunker};
use cdna_core::{CdnaError, CdnaResult, ChunkRef, HashAlgorithm, RecordKind};
use cdna_storage::{ContentStore, PutOutcome};

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// A manifest describing an ingested file's chunks and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Name the file was uploaded under
    pub filename: String,
    /// File size in bytes
    pub file_size: u64,
    /// Hash of the complete file content (hex)
    pub file_hash: String,
    /// Digest used for `file_hash` and every `chunk_hash`
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Chunk bound used when splitting
    pub chunk_size_bytes: u64,
    /// Ordered, contiguous chunk references
    pub fragments: Vec<ChunkRef>,
    /// Unix timestamp when this manifest was built
    pub created_at: u64,
}

impl Manifest {
    /// Check the layout invariants: fragments are numbered in order, start at
    /// zero, leave no gaps, respect the chunk bound, and sum to `file_size`.
    pub fn validate(&self) -> CdnaResult<()> {
        let bad = |reason: String| Err(CdnaError::malformed(RecordKind::Manifest, reason));

        if self.version == 0 || self.version > MANIFEST_VERSION {
            return bad(format!("unsupported version {}", self.version));
        }
        if ContentHash::from_hex(&self.file_hash).is_err() {
            return bad(format!("file_hash '{}' is not a 64-char hex digest", self.file_hash));
        }
        if self.chunk_size_bytes == 0 {
            return bad("chunk_size_bytes is zero".into());
        }

        let mut expected_offset = 0u64;
        for (i, frag) in self.fragments.iter().enumerate() {
            if frag.index != i as u64 {
                return bad(format!("fragment {i} has index {}", frag.index));
            }
            if frag.offset != expected_offset {
                return bad(format!(
                    "fragment {i} starts at {} but previous fragments end at {expected_offset}",
                    frag.offset
                ));
            }
            if frag.size == 0 || frag.size > self.chunk_size_bytes {
                return bad(format!(
                    "fragment {i} has size {} (bound {})",
                    frag.size, self.chunk_size_bytes
                ));
            }
            if ContentHash::from_hex(&frag.chunk_hash).is_err() {
                return bad(format!("fragment {i} has invalid chunk_hash"));
            }
            expected_offset = match frag.end() {
                Some(end) => end,
                None => return bad(format!("fragment {i} extends past u64::MAX")),
            };
        }

        if expected_offset != self.file_size {
            return bad(format!(
                "fragments cover {expected_offset} bytes but file_size is {}",
                self.file_size
            ));
        }
        Ok(())
    }

    /// Parse and validate JSON manifest bytes.
    pub fn from_bytes(data: &[u8]) -> CdnaResult<Self> {
        let manifest: Manifest = serde_json::from_slice(data)
            .map_err(|e| CdnaError::malformed(RecordKind::Manifest, e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serialize manifest to pretty JSON bytes.
    pub fn to_bytes(&self) -> CdnaResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CdnaError::Other(anyhow::anyhow!("serializing manifest: {e}")))
    }

    pub fn content_hash(&self) -> CdnaResult<ContentHash> {
        ContentHash::from_hex(&self.file_hash)
    }
}

/// Result of building a manifest from a stream
#[derive(Debug, Clone)]
pub struct ManifestBuild {
    pub manifest: Manifest,
    /// Chunks written for the first time
    pub new_chunks: usize,
    /// Chunks already present in the store
    pub deduplicated_chunks: usize,
}

/// Stream `reader` through the chunker, storing each chunk, and return the
/// manifest that reassembles it.
pub async fn build_manifest<R>(
    store: &ContentStore,
    filename: &str,
    reader: R,
    chunk_size: u64,
) -> CdnaResult<ManifestBuild>
where
    R: AsyncRead + Unpin,
{
    let mut chunker = FixedChunker::new(reader, chunk_size, store.algorithm())?;
    let mut fragments = Vec::new();
    let mut new_chunks = 0usize;
    let mut deduplicated_chunks = 0usize;

    while let Some(chunk) = chunker.next_chunk().await? {
        let put = store.put(&chunk.data).await?;
        match put.outcome {
            PutOutcome::Stored => new_chunks += 1,
            PutOutcome::Deduplicated => deduplicated_chunks += 1,
        }
        debug!(
            index = chunk.index,
            offset = chunk.offset,
            size = chunk.data.len(),
            hash = %put.hash,
            "fragment"
        );
        fragments.push(ChunkRef {
            index: chunk.index,
            offset: chunk.offset,
            size: chunk.data.len() as u64,
            chunk_hash: put.hash.to_hex(),
        });
    }

    let (file_hash, file_size) = chunker.finish();
    let manifest = Manifest {
        version: MANIFEST_VERSION,
        filename: filename.to_string(),
        file_size,
        file_hash: file_hash.to_hex(),
        hash_algorithm: store.algorithm(),
        chunk_size_bytes: chunk_size,
        fragments,
        created_at: crate::unix_now(),
    };

    Ok(ManifestBuild {
        manifest,
        new_chunks,
        deduplicated_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdna_chunks::hash_bytes;
    use cdna_storage::layout::Layout;

    fn store() -> ContentStore {
        ContentStore::new(
            cdna_storage::memory_operator().unwrap(),
            Layout::new("t"),
            HashAlgorithm::Sha512_256,
        )
    }

    fn sample(sizes: &[u64], chunk_size: u64) -> Manifest {
        let h = hash_bytes(HashAlgorithm::Sha512_256, b"chunk").to_hex();
        let mut offset = 0;
        let fragments = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let r = ChunkRef {
                    index: i as u64,
                    offset,
                    size,
                    chunk_hash: h.clone(),
                };
                offset += size;
                r
            })
            .collect();
        Manifest {
            version: MANIFEST_VERSION,
            filename: "f.bin".into(),
            file_size: offset,
            file_hash: h.clone(),
            hash_algorithm: HashAlgorithm::Sha512_256,
            chunk_size_bytes: chunk_size,
            fragments,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn build_splits_at_fixed_offsets() {
        let store = store();
        let data: Vec<u8> = (0u8..=255).cycle().take(2500).collect();
        let built = build_manifest(&store, "a.bin", &data[..], 1000).await.unwrap();
        let m = &built.manifest;

        assert_eq!(m.file_size, 2500);
        assert_eq!(m.fragments.len(), 3);
        assert_eq!(
            m.fragments.iter().map(|f| f.offset).collect::<Vec<_>>(),
            vec![0, 1000, 2000]
        );
        assert_eq!(m.fragments[2].size, 500);
        assert_eq!(m.file_hash, hash_bytes(HashAlgorithm::Sha512_256, &data).to_hex());
        assert_eq!(built.new_chunks, 3);
        m.validate().unwrap();
    }

    #[tokio::test]
    async fn repeated_chunks_are_stored_once() {
        let store = store();
        let data = vec![0u8; 4000];
        let built = build_manifest(&store, "zeros", &data[..], 1000).await.unwrap();
        assert_eq!(built.manifest.fragments.len(), 4);
        assert_eq!(built.new_chunks, 1);
        assert_eq!(built.deduplicated_chunks, 3);
    }

    #[tokio::test]
    async fn empty_stream_has_no_fragments() {
        let store = store();
        let built = build_manifest(&store, "empty", &b""[..], 1000).await.unwrap();
        assert!(built.manifest.fragments.is_empty());
        assert_eq!(built.manifest.file_size, 0);
        built.manifest.validate().unwrap();
    }

    #[test]
    fn json_roundtrip() {
        let m = sample(&[10, 10, 3], 10);
        let back = Manifest::from_bytes(&m.to_bytes().unwrap()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn rejects_gap_between_fragments() {
        let mut m = sample(&[10, 10], 10);
        m.fragments[1].offset = 11;
        m.file_size = 21;
        assert!(matches!(m.validate(), Err(CdnaError::MalformedRecord { .. })));
    }

    #[test]
    fn rejects_size_disagreement() {
        let mut m = sample(&[10, 5], 10);
        m.file_size = 16;
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_oversized_fragment() {
        let m = sample(&[10, 11], 10);
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_out_of_order_index() {
        let mut m = sample(&[10, 10], 10);
        m.fragments[1].index = 5;
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_fragments_overflowing_u64() {
        let h = hash_bytes(HashAlgorithm::Sha512_256, b"chunk").to_hex();
        let json = serde_json::json!({
            "version": 1,
            "filename": "huge.bin",
            "file_size": 0,
            "file_hash": h,
            "chunk_size_bytes": u64::MAX,
            "fragments": [
                { "index": 0, "offset": 0, "size": u64::MAX, "chunk_hash": h },
                { "index": 1, "offset": u64::MAX, "size": 1, "chunk_hash": h }
            ],
            "created_at": 0
        });
        let err = Manifest::from_bytes(&serde_json::to_vec(&json).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            CdnaError::MalformedRecord {
                kind: RecordKind::Manifest,
                ..
            }
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = Manifest::from_bytes(br#"{"filename":"x"}"#).unwrap_err();
        assert!(matches!(
            err,
            CdnaError::MalformedRecord {
                kind: RecordKind::Manifest,
                ..
            }
        ));
    }

    #[test]
    fn hash_algorithm_defaults_when_absent() {
        let m = sample(&[4], 8);
        let mut value: serde_json::Value = serde_json::from_slice(&m.to_bytes().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("hash_algorithm");
        let back = Manifest::from_bytes(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(back.hash_algorithm, HashAlgorithm::Sha512_256);
    }
}
