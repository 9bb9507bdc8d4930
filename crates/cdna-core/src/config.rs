use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CdnaError, CdnaResult};
use crate::types::HashAlgorithm;

/// Default chunk bound: 512 KiB
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Default logistic-map growth rate, inside the chaotic band (3.57, 4)
pub const DEFAULT_CHAOTIC_R: f64 = 3.99;

/// Top-level configuration (loaded from cdna.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnaConfig {
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub compression: CompressionConfig,
    pub cipher: CipherConfig,
    pub logging: LoggingConfig,
}

impl CdnaConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> CdnaResult<Self> {
        let config: CdnaConfig =
            toml::from_str(s).map_err(|e| CdnaError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CdnaResult<()> {
        if self.chunking.chunk_size_bytes == 0 {
            return Err(CdnaError::Config(
                "chunking.chunk_size_bytes must be greater than zero".into(),
            ));
        }
        if self.compression.level > 9 {
            return Err(CdnaError::Config(format!(
                "compression.level must be 0..=9, got {}",
                self.compression.level
            )));
        }
        if !self.cipher.r.is_finite() || self.cipher.r <= 0.0 {
            return Err(CdnaError::Config(format!(
                "cipher.r must be a positive finite number, got {}",
                self.cipher.r
            )));
        }
        if !(3.57..4.0).contains(&self.cipher.r) {
            tracing::warn!(
                r = self.cipher.r,
                "cipher.r is outside the chaotic band (3.57, 4); key streams may be periodic"
            );
        }
        match self.storage.backend.as_str() {
            "fs" | "memory" | "s3" => Ok(()),
            other => Err(CdnaError::Config(format!(
                "storage.backend must be one of fs, memory, s3 (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "fs", "memory", or "s3"
    pub backend: String,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix for every object written by the pipeline
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket
    pub bucket: String,
    /// Enforce HTTPS for S3 connections
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Fixed chunk bound in bytes; the final chunk may be shorter
    pub chunk_size_bytes: u64,
    /// Digest for chunk addresses and file identity
    pub hash_algorithm: HashAlgorithm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// zlib level, 0..=9
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Logistic-map growth rate used for every new artifact
    pub r: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "fs".into(),
            root: PathBuf::from("~/.local/share/cdna/storage"),
            prefix: "cdna".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "cdna".into(),
            enforce_tls: false,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            r: DEFAULT_CHAOTIC_R,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
