//! Reassemble a file's bytes from its manifest

use tracing::debug;

use cdna_chunks::ContentHash;
use cdna_core::{CdnaError, CdnaResult};
use cdna_storage::ContentStore;

use crate::manifest::Manifest;

/// Upper bound on the up-front buffer reservation; larger files grow the
/// buffer as fragments arrive.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Fetch every fragment in manifest order and concatenate.
///
/// A fragment absent from the store is `MissingChunk`; a fragment whose
/// stored length disagrees with the manifest, or a total that disagrees
/// with `file_size`, is `SizeMismatch`.
pub async fn reconstruct(store: &ContentStore, manifest: &Manifest) -> CdnaResult<Vec<u8>> {
    let capacity = usize::try_from(manifest.file_size.min(MAX_PREALLOC)).unwrap_or(0);
    let mut assembled = Vec::with_capacity(capacity);

    for frag in &manifest.fragments {
        let hash = ContentHash::from_hex(&frag.chunk_hash)?;
        let data = store.get(&hash).await.map_err(|e| match e {
            CdnaError::NotFound { .. } => CdnaError::MissingChunk {
                index: frag.index,
                hash: frag.chunk_hash.clone(),
            },
            other => other,
        })?;

        if data.len() as u64 != frag.size {
            return Err(CdnaError::SizeMismatch {
                context: format!("fragment {}", frag.index),
                expected: frag.size,
                actual: data.len() as u64,
            });
        }
        debug!(index = frag.index, size = frag.size, "fragment fetched");
        assembled.extend_from_slice(&data);
    }

    if assembled.len() as u64 != manifest.file_size {
        return Err(CdnaError::SizeMismatch {
            context: format!("file {}", manifest.file_hash),
            expected: manifest.file_size,
            actual: assembled.len() as u64,
        });
    }
    Ok(assembled)
}
