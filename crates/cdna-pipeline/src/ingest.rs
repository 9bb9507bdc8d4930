//! Ingest: store a file's chunks, build its manifest, and publish the
//! chaotic-DNA ciphertext of its compressed content.

use std::time::Instant;

use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use cdna_chunks::{compress, hash_bytes, ContentHash};
use cdna_cipher::{encode, encrypt_with, BaseDistribution, ChaoticParams};
use cdna_core::{CdnaError, CdnaResult, ChunkRef, RecordKind};

use crate::manifest::{build_manifest, Manifest};
use crate::metadata::{ChaoticParameters, EncryptionMetadata, METADATA_VERSION};
use crate::reconstruct::reconstruct;
use crate::records::RecordWrite;
use crate::{unix_now, Pipeline};

/// Progress callback type (items_done, items_total, message). A total of 0
/// means the total is not known yet.
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct CompressionStats {
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent saved, two decimals
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncryptionStats {
    pub x0: f64,
    pub r: f64,
    pub symbol_length: u64,
    pub plain_distribution: BaseDistribution,
    pub cipher_distribution: BaseDistribution,
    pub ciphertext_size: u64,
    pub elapsed_ms: u64,
}

/// Summary of one ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub file_hash: String,
    pub filename: String,
    pub manifest_key: String,
    pub chunk_size_bytes: u64,
    pub fragments: Vec<ChunkRef>,
    /// Chunks that were not already in the store
    pub new_chunks: usize,
    pub created_at: u64,
    pub compression: CompressionStats,
    pub encryption: EncryptionStats,
    /// True when the encrypted artifact already existed and was kept
    pub reused: bool,
}

/// `(1 - compressed/original) * 100`, rounded to two decimals; 0 for empty input.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let pct = (1.0 - compressed as f64 / original as f64) * 100.0;
    (pct * 100.0).round() / 100.0
}

impl Pipeline {
    /// Ingest an in-memory buffer.
    pub async fn ingest_bytes(&self, filename: &str, data: &[u8]) -> CdnaResult<IngestReport> {
        self.ingest(filename, data).await
    }

    pub async fn ingest<R>(&self, filename: &str, reader: R) -> CdnaResult<IngestReport>
    where
        R: AsyncRead + Unpin,
    {
        self.ingest_with_progress(filename, reader, None).await
    }

    /// Ingest a stream, reporting each stored chunk and each later stage to
    /// `progress`.
    pub async fn ingest_with_progress<R>(
        &self,
        filename: &str,
        reader: R,
        progress: Option<&ProgressFn>,
    ) -> CdnaResult<IngestReport>
    where
        R: AsyncRead + Unpin,
    {
        let built = build_manifest(
            &self.store,
            filename,
            reader,
            self.settings.chunk_size_bytes,
        )
        .await?;
        if let Some(cb) = progress {
            cb(
                built.manifest.fragments.len() as u64,
                built.manifest.fragments.len() as u64,
                &format!("stored {} fragments", built.manifest.fragments.len()),
            );
        }

        let file_hash = built.manifest.content_hash()?;
        let manifest_key = self.records.layout().manifest(&file_hash);
        let manifest = match self.records.put_manifest(&built.manifest).await? {
            RecordWrite::Created => built.manifest,
            RecordWrite::AlreadyPresent => self.records.manifest(&file_hash).await?,
        };

        if self.records.has_encrypted_artifact(&file_hash).await? {
            let meta = self.records.metadata(&file_hash).await?;
            info!(hash = %file_hash, filename, "encrypted artifact already present, reusing");
            return Ok(report(manifest, manifest_key, built.new_chunks, &meta, 0, true));
        }

        if let Some(cb) = progress {
            cb(0, 0, "compressing");
        }
        let started = Instant::now();
        let data = reconstruct(&self.store, &manifest).await?;
        let compressed = compress(&data, self.settings.compression_level)?;
        let plain = encode(&compressed);

        if let Some(cb) = progress {
            cb(0, 0, "encrypting");
        }
        let compressed_hash = hash_bytes(manifest.hash_algorithm, &compressed).to_hex();
        let params = match self.orphaned_metadata(&file_hash, &compressed_hash).await? {
            Some(params) => params,
            None => ChaoticParams::random(&mut rand::thread_rng(), self.settings.r),
        };
        let cipher = encrypt_with(&plain, &params)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            hash = %file_hash,
            original = data.len(),
            compressed = compressed.len(),
            symbols = plain.len(),
            "payload encrypted"
        );

        let meta = EncryptionMetadata {
            version: METADATA_VERSION,
            filename: filename.to_string(),
            file_hash: file_hash.to_hex(),
            compressed_hash,
            symbol_length: plain.len() as u64,
            plain_distribution: plain.distribution(),
            cipher_distribution: cipher.distribution(),
            chaotic_parameters: ChaoticParameters {
                params,
                iterations: plain.len() as u64,
            },
            created_at: unix_now(),
            compressed_size: compressed.len() as u64,
        };

        let (meta, reused) = {
            let _guard = self.publish.lock().await;
            if self.records.has_encrypted_artifact(&file_hash).await? {
                debug!(hash = %file_hash, "lost publish race, keeping stored artifact");
                (self.records.metadata(&file_hash).await?, true)
            } else {
                self.records.put_ciphertext(&file_hash, &cipher).await?;
                match self.records.put_metadata(&meta).await? {
                    RecordWrite::Created => (meta, false),
                    RecordWrite::AlreadyPresent => (self.records.metadata(&file_hash).await?, false),
                }
            }
        };

        let report = report(manifest, manifest_key, built.new_chunks, &meta, elapsed_ms, reused);
        info!(
            hash = %report.file_hash,
            filename,
            fragments = report.fragments.len(),
            bytes = report.compression.original_size,
            compressed = report.compression.compressed_size,
            ratio = report.compression.ratio,
            symbols = report.encryption.symbol_length,
            elapsed_ms,
            "ingested"
        );
        Ok(report)
    }
}

impl Pipeline {
    /// Metadata left behind without its ciphertext. Its seed is reused so the
    /// rewritten ciphertext matches the write-once record; a record made for a
    /// different payload cannot be repaired.
    async fn orphaned_metadata(
        &self,
        file_hash: &ContentHash,
        compressed_hash: &str,
    ) -> CdnaResult<Option<ChaoticParams>> {
        let meta = match self.records.metadata(file_hash).await {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if meta.compressed_hash != compressed_hash {
            return Err(CdnaError::malformed(
                RecordKind::EncryptionMetadata,
                format!("stored record for {file_hash} has no ciphertext and describes another payload"),
            ));
        }
        warn!(hash = %file_hash, "metadata without ciphertext, re-encrypting with recorded seed");
        Ok(Some(meta.params()))
    }
}

fn report(
    manifest: Manifest,
    manifest_key: String,
    new_chunks: usize,
    meta: &EncryptionMetadata,
    elapsed_ms: u64,
    reused: bool,
) -> IngestReport {
    let params = meta.params();
    IngestReport {
        file_hash: manifest.file_hash,
        filename: manifest.filename,
        manifest_key,
        chunk_size_bytes: manifest.chunk_size_bytes,
        fragments: manifest.fragments,
        new_chunks,
        created_at: manifest.created_at,
        compression: CompressionStats {
            original_size: manifest.file_size,
            compressed_size: meta.compressed_size,
            ratio: compression_ratio(manifest.file_size, meta.compressed_size),
        },
        encryption: EncryptionStats {
            x0: params.x0(),
            r: params.r(),
            symbol_length: meta.symbol_length,
            plain_distribution: meta.plain_distribution,
            cipher_distribution: meta.cipher_distribution,
            ciphertext_size: meta.symbol_length,
            elapsed_ms,
        },
        reused,
    }
}
