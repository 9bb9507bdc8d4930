//! cdna-pipeline: ingest and retrieve orchestration
//!
//! Ingest: chunk → content store → manifest → reconstruct → deflate →
//! DNA encode → logistic-map key stream → mod-4 substitution → persist.
//!
//! Retrieve: load records → parse ciphertext → regenerate key stream →
//! decrypt → decode → inflate → rehash and compare.

pub mod ingest;
pub mod manifest;
pub mod metadata;
pub mod reconstruct;
pub mod records;
pub mod retrieve;

use std::sync::Arc;

use opendal::Operator;
use tokio::sync::Mutex;

use cdna_chunks::ContentHash;
use cdna_core::config::CdnaConfig;
use cdna_core::{CdnaResult, HashAlgorithm};
use cdna_storage::layout::Layout;
use cdna_storage::ContentStore;

pub use ingest::{CompressionStats, EncryptionStats, IngestReport, ProgressFn};
pub use manifest::{build_manifest, Manifest, ManifestBuild};
pub use metadata::{ChaoticParameters, EncryptionMetadata};
pub use reconstruct::reconstruct;
pub use records::{RecordStore, RecordWrite};
pub use retrieve::{EncryptedArtifact, IntegrityStatus, Retrieved};

/// Tunables for one pipeline, usually taken from `CdnaConfig`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub chunk_size_bytes: u64,
    pub hash_algorithm: HashAlgorithm,
    pub compression_level: u32,
    /// Logistic-map growth rate for new encryptions
    pub r: f64,
}

impl PipelineSettings {
    pub fn from_config(config: &CdnaConfig) -> Self {
        Self {
            chunk_size_bytes: config.chunking.chunk_size_bytes,
            hash_algorithm: config.chunking.hash_algorithm,
            compression_level: config.compression.level,
            r: config.cipher.r,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&CdnaConfig::default())
    }
}

/// Ingest/retrieve front end over one storage prefix. Cheap to clone; clones
/// share the same operator.
#[derive(Clone)]
pub struct Pipeline {
    store: ContentStore,
    records: RecordStore,
    settings: PipelineSettings,
    /// Serializes the check-then-write of encrypted artifacts in this process
    publish: Arc<Mutex<()>>,
}

impl Pipeline {
    pub fn new(op: Operator, prefix: &str, settings: PipelineSettings) -> Self {
        let layout = Layout::new(prefix);
        Self {
            store: ContentStore::new(op.clone(), layout.clone(), settings.hash_algorithm),
            records: RecordStore::new(op, layout),
            settings,
            publish: Arc::new(Mutex::new(())),
        }
    }

    /// Validate `config` and build a pipeline over `op` with its settings.
    pub fn from_config(op: Operator, config: &CdnaConfig) -> CdnaResult<Self> {
        config.validate()?;
        Ok(Self::new(
            op,
            &config.storage.prefix,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub async fn manifest(&self, file_hash: &str) -> CdnaResult<Manifest> {
        self.records.manifest(&ContentHash::from_hex(file_hash)?).await
    }

    pub async fn metadata(&self, file_hash: &str) -> CdnaResult<EncryptionMetadata> {
        self.records.metadata(&ContentHash::from_hex(file_hash)?).await
    }

    /// File hashes of every stored manifest, sorted
    pub async fn list(&self) -> CdnaResult<Vec<ContentHash>> {
        self.records.list().await
    }
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
