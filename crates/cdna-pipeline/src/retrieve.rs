//! Retrieve: decrypt a stored artifact and verify it against its manifest

use serde::Serialize;
use tracing::{debug, info, warn};

use cdna_chunks::{decompress_with_framing, hash_bytes, ContentHash, Framing};
use cdna_cipher::{decode, decrypt_with, SymbolSequence};
use cdna_core::{CdnaError, CdnaResult};

use crate::Pipeline;

/// Outcome of comparing the recovered bytes with the manifest's file hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityStatus {
    Verified,
    Mismatch { expected: String, actual: String },
}

/// A decrypted file. A hash mismatch is carried here rather than raised, so
/// callers can still inspect what was recovered.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub filename: String,
    pub file_hash: String,
    pub data: Vec<u8>,
    pub integrity: IntegrityStatus,
    /// Framing the compressed payload turned out to use
    pub framing: Framing,
}

impl Retrieved {
    pub fn is_verified(&self) -> bool {
        self.integrity == IntegrityStatus::Verified
    }

    /// The recovered bytes, or `IntegrityMismatch` if they failed verification.
    pub fn into_verified(self) -> CdnaResult<Vec<u8>> {
        match self.integrity {
            IntegrityStatus::Verified => Ok(self.data),
            IntegrityStatus::Mismatch { expected, actual } => {
                Err(CdnaError::IntegrityMismatch { expected, actual })
            }
        }
    }
}

/// Stored ciphertext as served for download
#[derive(Debug, Clone)]
pub struct EncryptedArtifact {
    pub filename: String,
    pub file_hash: String,
    /// ASCII `A`/`T`/`C`/`G` text
    pub ciphertext: Vec<u8>,
}

impl Pipeline {
    pub async fn retrieve(&self, file_hash: &str) -> CdnaResult<Retrieved> {
        let hash = ContentHash::from_hex(file_hash)?;
        let manifest = self.records.manifest(&hash).await?;
        let meta = self.records.metadata(&hash).await?;
        let raw = self.records.ciphertext(&hash).await?;
        if raw.is_empty() {
            return Err(CdnaError::invalid_format("ciphertext is empty"));
        }

        let cipher = SymbolSequence::from_ascii(&raw).map_err(|e| match e {
            CdnaError::InvalidSymbol { position, symbol } => CdnaError::invalid_format(format!(
                "ciphertext has {symbol:?} at position {position}"
            )),
            other => other,
        })?;

        let recorded = meta.chaotic_parameters.iterations;
        if cipher.len() as u64 != recorded {
            warn!(
                hash = %hash,
                symbols = cipher.len(),
                recorded,
                "ciphertext length differs from recorded key stream length"
            );
        }

        let plain = decrypt_with(&cipher, &meta.params())?;
        let compressed = decode(&plain)?;
        if hash_bytes(manifest.hash_algorithm, &compressed).to_hex() != meta.compressed_hash {
            debug!(hash = %hash, "compressed payload differs from recorded hash");
        }
        let (data, framing) = decompress_with_framing(&compressed)?;

        let actual = hash_bytes(manifest.hash_algorithm, &data).to_hex();
        let integrity = if actual == manifest.file_hash {
            info!(
                hash = %hash,
                filename = %manifest.filename,
                bytes = data.len(),
                "retrieved and verified"
            );
            IntegrityStatus::Verified
        } else {
            warn!(
                expected = %manifest.file_hash,
                actual = %actual,
                bytes = data.len(),
                "integrity check failed"
            );
            IntegrityStatus::Mismatch {
                expected: manifest.file_hash.clone(),
                actual,
            }
        };

        Ok(Retrieved {
            filename: manifest.filename,
            file_hash: manifest.file_hash,
            data,
            integrity,
            framing,
        })
    }

    /// The stored ciphertext for `file_hash`, without decrypting it.
    pub async fn fetch_ciphertext(&self, file_hash: &str) -> CdnaResult<EncryptedArtifact> {
        let hash = ContentHash::from_hex(file_hash)?;
        let meta = self.records.metadata(&hash).await?;
        let ciphertext = self.records.ciphertext(&hash).await?;
        Ok(EncryptedArtifact {
            filename: meta.filename,
            file_hash: meta.file_hash,
            ciphertext,
        })
    }
}
