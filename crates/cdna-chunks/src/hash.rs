//! Content hashing for chunks and whole files
//!
//! SHA-512/256 is the default digest (identical to what earlier deployments
//! wrote into manifests); BLAKE3 is available for new stores. Both produce
//! 32 bytes, displayed as 64 lowercase hex chars, which is the CAS key.

use cdna_core::{CdnaError, CdnaResult, HashAlgorithm};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;

/// A 32-byte content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex (64 chars)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char hex string. Rejects anything else, so a parsed hash is
    /// always safe to splice into a storage key.
    pub fn from_hex(s: &str) -> CdnaResult<Self> {
        if s.len() != 64 {
            return Err(CdnaError::InvalidHash(s.to_string()));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|_| CdnaError::InvalidHash(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = CdnaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Incremental hasher over either supported digest
pub enum ContentHasher {
    Sha512_256(Sha512_256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha512_256 => ContentHasher::Sha512_256(Sha512_256::new()),
            HashAlgorithm::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            ContentHasher::Sha512_256(_) => HashAlgorithm::Sha512_256,
            ContentHasher::Blake3(_) => HashAlgorithm::Blake3,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha512_256(h) => h.update(data),
            ContentHasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> ContentHash {
        match self {
            ContentHasher::Sha512_256(h) => ContentHash(h.finalize().into()),
            ContentHasher::Blake3(h) => ContentHash(*h.finalize().as_bytes()),
        }
    }
}

/// Hash a byte slice in memory
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> ContentHash {
    let mut hasher = ContentHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}
