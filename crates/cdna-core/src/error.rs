use thiserror::Error;

use crate::types::RecordKind;

pub type CdnaResult<T> = Result<T, CdnaError>;

#[derive(Debug, Error)]
pub enum CdnaError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    #[error("chunk {index} missing from content store: {hash}")]
    MissingChunk { index: u64, hash: String },

    #[error("size mismatch in {context}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        context: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { position: usize, symbol: char },

    #[error("invalid format: {reason}")]
    InvalidFormat { reason: String },

    /// Key stream and symbol sequence disagree in length. Only reachable
    /// through a sizing bug in the caller.
    #[error("length mismatch: {symbols} symbols but {keys} key values")]
    LengthMismatch { symbols: usize, keys: usize },

    #[error("decompression failed (zlib: {zlib}; raw deflate: {raw})")]
    DecompressionFailed { zlib: String, raw: String },

    #[error("integrity verification failed: expected {expected}, recovered {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("malformed {kind}: {reason}")]
    MalformedRecord { kind: RecordKind, reason: String },

    #[error("invalid content hash '{0}'")]
    InvalidHash(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CdnaError {
    pub fn not_found(kind: RecordKind, key: impl Into<String>) -> Self {
        CdnaError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn malformed(kind: RecordKind, reason: impl Into<String>) -> Self {
        CdnaError::MalformedRecord {
            kind,
            reason: reason.into(),
        }
    }

    pub fn invalid_format(reason: impl Into<String>) -> Self {
        CdnaError::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// True for the absent-record family (manifest, metadata, ciphertext, chunk).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CdnaError::NotFound { .. } | CdnaError::MissingChunk { .. }
        )
    }
}
