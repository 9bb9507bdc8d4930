use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Digest used for chunk addresses and whole-file identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-512/256: the default, matches artifacts produced by earlier deployments
    #[default]
    #[serde(rename = "sha512-256")]
    Sha512_256,
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha512_256 => "sha512-256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha512-256" | "sha512256" | "sha512/256" => Ok(HashAlgorithm::Sha512_256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(format!("unknown hash algorithm '{other}'")),
        }
    }
}

/// Persisted record families, used to label lookups and validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Chunk,
    Manifest,
    EncryptionMetadata,
    Ciphertext,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Chunk => "chunk",
            RecordKind::Manifest => "manifest",
            RecordKind::EncryptionMetadata => "encryption metadata",
            RecordKind::Ciphertext => "ciphertext",
        })
    }
}

/// A content-addressed chunk reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub index: u64,
    pub offset: u64,
    pub size: u64,
    pub chunk_hash: String,
}

impl ChunkRef {
    /// Offset one past the last byte covered by this chunk, or `None` if
    /// that overflows `u64`
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_algorithm_parses_node_style_names() {
        assert_eq!("sha512-256".parse(), Ok(HashAlgorithm::Sha512_256));
        assert_eq!("SHA512256".parse(), Ok(HashAlgorithm::Sha512_256));
        assert_eq!("blake3".parse(), Ok(HashAlgorithm::Blake3));
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn hash_algorithm_serializes_as_name() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            alg: HashAlgorithm,
        }
        let s = toml::to_string(&Wrap {
            alg: HashAlgorithm::Sha512_256,
        })
        .unwrap();
        assert!(s.contains("\"sha512-256\""));
        let back: Wrap = toml::from_str("alg = \"blake3\"").unwrap();
        assert_eq!(back.alg, HashAlgorithm::Blake3);
    }

    #[test]
    fn chunk_ref_end() {
        let r = ChunkRef {
            index: 1,
            offset: 524288,
            size: 1000,
            chunk_hash: "x".into(),
        };
        assert_eq!(r.end(), Some(525288));
    }

    #[test]
    fn chunk_ref_end_overflow() {
        let r = ChunkRef {
            index: 1,
            offset: u64::MAX,
            size: 1,
            chunk_hash: "x".into(),
        };
        assert_eq!(r.end(), None);
    }
}
