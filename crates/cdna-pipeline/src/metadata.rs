//! Encryption metadata: everything needed to replay the key stream and check
//! the recovered file, stored at `{prefix}/encrypted/{file_hash}.meta.json`

use serde::{Deserialize, Serialize};

use cdna_chunks::ContentHash;
use cdna_cipher::{BaseDistribution, ChaoticParams};
use cdna_core::{CdnaError, CdnaResult, RecordKind};

pub const METADATA_VERSION: u32 = 1;

/// Key stream seed plus the stream length used at encryption time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaoticParameters {
    #[serde(flatten)]
    pub params: ChaoticParams,
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    pub version: u32,
    pub filename: String,
    pub file_hash: String,
    /// Hash of the deflate payload before symbol encoding
    pub compressed_hash: String,
    /// Number of bases in plaintext and ciphertext
    pub symbol_length: u64,
    pub plain_distribution: BaseDistribution,
    pub cipher_distribution: BaseDistribution,
    pub chaotic_parameters: ChaoticParameters,
    pub created_at: u64,
    pub compressed_size: u64,
}

impl EncryptionMetadata {
    pub fn params(&self) -> ChaoticParams {
        self.chaotic_parameters.params
    }

    pub fn validate(&self) -> CdnaResult<()> {
        let bad = |reason: String| {
            Err(CdnaError::malformed(RecordKind::EncryptionMetadata, reason))
        };

        if self.version == 0 || self.version > METADATA_VERSION {
            return bad(format!("unsupported version {}", self.version));
        }
        if ContentHash::from_hex(&self.file_hash).is_err() {
            return bad(format!("file_hash '{}' is not a 64-char hex digest", self.file_hash));
        }
        if ContentHash::from_hex(&self.compressed_hash).is_err() {
            return bad("compressed_hash is not a 64-char hex digest".into());
        }

        // x0 is clamped on read; r is used as recorded
        let r = self.params().r();
        if !r.is_finite() {
            return bad(format!("growth rate {r} is not a finite number"));
        }

        if self.chaotic_parameters.iterations != self.symbol_length {
            return bad(format!(
                "iterations {} != symbol_length {}",
                self.chaotic_parameters.iterations, self.symbol_length
            ));
        }
        if self.compressed_size.checked_mul(4) != Some(self.symbol_length) {
            return bad(format!(
                "symbol_length {} is not 4 x compressed_size {}",
                self.symbol_length, self.compressed_size
            ));
        }
        for (name, dist) in [
            ("plain_distribution", &self.plain_distribution),
            ("cipher_distribution", &self.cipher_distribution),
        ] {
            if dist.total() != self.symbol_length {
                return bad(format!(
                    "{name} sums to {} but symbol_length is {}",
                    dist.total(),
                    self.symbol_length
                ));
            }
        }
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> CdnaResult<Self> {
        let meta: EncryptionMetadata = serde_json::from_slice(data)
            .map_err(|e| CdnaError::malformed(RecordKind::EncryptionMetadata, e.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn to_bytes(&self) -> CdnaResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CdnaError::Other(anyhow::anyhow!("serializing metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdna_chunks::hash_bytes;
    use cdna_cipher::{encode, encrypt_with};
    use cdna_core::HashAlgorithm;

    fn sample() -> EncryptionMetadata {
        let compressed = b"\x78\x9c\x03\x00\x00\x00\x00\x01";
        let plain = encode(compressed);
        let params = ChaoticParams::new(0.42, 3.99);
        let cipher = encrypt_with(&plain, &params).unwrap();
        EncryptionMetadata {
            version: METADATA_VERSION,
            filename: "empty.txt".into(),
            file_hash: hash_bytes(HashAlgorithm::Sha512_256, b"").to_hex(),
            compressed_hash: hash_bytes(HashAlgorithm::Sha512_256, compressed).to_hex(),
            symbol_length: plain.len() as u64,
            plain_distribution: plain.distribution(),
            cipher_distribution: cipher.distribution(),
            chaotic_parameters: ChaoticParameters {
                params,
                iterations: plain.len() as u64,
            },
            created_at: 1_700_000_000,
            compressed_size: compressed.len() as u64,
        }
    }

    #[test]
    fn sample_is_valid() {
        sample().validate().unwrap();
    }

    #[test]
    fn chaotic_block_is_flat() {
        let json: serde_json::Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        let block = &json["chaotic_parameters"];
        assert!(block["x0"].is_string());
        assert!(block["r"].is_string());
        assert_eq!(block["iterations"], 32);
        let total: u64 = ["A", "T", "C", "G"]
            .iter()
            .map(|b| json["plain_distribution"][b].as_u64().unwrap())
            .sum();
        assert_eq!(total, 32);
    }

    #[test]
    fn roundtrip_keeps_exact_seed() {
        let meta = sample();
        let back = EncryptionMetadata::from_bytes(&meta.to_bytes().unwrap()).unwrap();
        assert_eq!(back.params().x0().to_bits(), meta.params().x0().to_bits());
        assert_eq!(back, meta);
    }

    #[test]
    fn decimal_seed_is_accepted() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        json["chaotic_parameters"]["x0"] = serde_json::json!(0.42);
        json["chaotic_parameters"]["r"] = serde_json::json!(3.99);
        let back = EncryptionMetadata::from_bytes(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(back.params(), ChaoticParams::new(0.42, 3.99));
    }

    #[test]
    fn rejects_iteration_disagreement() {
        let mut meta = sample();
        meta.chaotic_parameters.iterations += 1;
        assert!(matches!(
            meta.validate(),
            Err(CdnaError::MalformedRecord {
                kind: RecordKind::EncryptionMetadata,
                ..
            })
        ));
    }

    #[test]
    fn rejects_distribution_disagreement() {
        let mut meta = sample();
        meta.cipher_distribution.g += 1;
        assert!(meta.validate().is_err());
    }

    #[test]
    fn rejects_bad_growth_rate() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        json["chaotic_parameters"]["r"] = serde_json::json!("7ff0000000000000");
        assert!(EncryptionMetadata::from_bytes(&serde_json::to_vec(&json).unwrap()).is_err());
    }

    #[test]
    fn boundary_seed_is_clamped_not_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        json["chaotic_parameters"]["x0"] = serde_json::json!(1.0);
        let back = EncryptionMetadata::from_bytes(&serde_json::to_vec(&json).unwrap()).unwrap();
        assert_eq!(back.params(), ChaoticParams::new(0.9999, 3.99));
    }

    #[test]
    fn rejects_truncated_json() {
        let bytes = sample().to_bytes().unwrap();
        let err = EncryptionMetadata::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, CdnaError::MalformedRecord { .. }));
    }
}
