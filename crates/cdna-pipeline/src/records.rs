//! Per-file records: manifest, encryption metadata, and ciphertext
//!
//! Manifest and metadata are write-once: a second `put` for the same file
//! hash leaves the stored record untouched and reports it as already present.

use opendal::{ErrorKind, Operator};
use tracing::debug;

use cdna_chunks::ContentHash;
use cdna_cipher::SymbolSequence;
use cdna_core::{CdnaError, CdnaResult, RecordKind};
use cdna_storage::layout::Layout;
use cdna_storage::storage_error as map_err;

use crate::manifest::Manifest;
use crate::metadata::EncryptionMetadata;

/// Whether a write-once put created the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordWrite {
    Created,
    AlreadyPresent,
}

#[derive(Clone)]
pub struct RecordStore {
    op: Operator,
    layout: Layout,
}

impl RecordStore {
    pub fn new(op: Operator, layout: Layout) -> Self {
        Self { op, layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    async fn read(&self, kind: RecordKind, key: &str) -> CdnaResult<Vec<u8>> {
        let buf = self.op.read(key).await.map_err(|e| map_err(kind, key, e))?;
        Ok(buf.to_vec())
    }

    async fn exists(&self, kind: RecordKind, key: &str) -> CdnaResult<bool> {
        self.op.exists(key).await.map_err(|e| map_err(kind, key, e))
    }

    async fn write_once(&self, kind: RecordKind, key: &str, body: Vec<u8>) -> CdnaResult<RecordWrite> {
        if self.exists(kind, key).await? {
            debug!(%kind, key, "record already present, keeping stored copy");
            return Ok(RecordWrite::AlreadyPresent);
        }
        self.op.write(key, body).await.map_err(|e| map_err(kind, key, e))?;
        Ok(RecordWrite::Created)
    }

    pub async fn put_manifest(&self, manifest: &Manifest) -> CdnaResult<RecordWrite> {
        let key = self.layout.manifest(&manifest.content_hash()?);
        self.write_once(RecordKind::Manifest, &key, manifest.to_bytes()?).await
    }

    pub async fn manifest(&self, file_hash: &ContentHash) -> CdnaResult<Manifest> {
        let key = self.layout.manifest(file_hash);
        let manifest = Manifest::from_bytes(&self.read(RecordKind::Manifest, &key).await?)?;
        if manifest.file_hash != file_hash.to_hex() {
            return Err(CdnaError::malformed(
                RecordKind::Manifest,
                format!("{key} describes {}", manifest.file_hash),
            ));
        }
        Ok(manifest)
    }

    pub async fn has_manifest(&self, file_hash: &ContentHash) -> CdnaResult<bool> {
        self.exists(RecordKind::Manifest, &self.layout.manifest(file_hash)).await
    }

    pub async fn put_metadata(&self, meta: &EncryptionMetadata) -> CdnaResult<RecordWrite> {
        let hash = ContentHash::from_hex(&meta.file_hash)?;
        let key = self.layout.metadata(&hash);
        self.write_once(RecordKind::EncryptionMetadata, &key, meta.to_bytes()?).await
    }

    pub async fn metadata(&self, file_hash: &ContentHash) -> CdnaResult<EncryptionMetadata> {
        let key = self.layout.metadata(file_hash);
        let meta =
            EncryptionMetadata::from_bytes(&self.read(RecordKind::EncryptionMetadata, &key).await?)?;
        if meta.file_hash != file_hash.to_hex() {
            return Err(CdnaError::malformed(
                RecordKind::EncryptionMetadata,
                format!("{key} describes {}", meta.file_hash),
            ));
        }
        Ok(meta)
    }

    /// Ciphertext is written before its metadata, so an artifact is complete
    /// only once both exist.
    pub async fn has_encrypted_artifact(&self, file_hash: &ContentHash) -> CdnaResult<bool> {
        Ok(self
            .exists(RecordKind::EncryptionMetadata, &self.layout.metadata(file_hash))
            .await?
            && self
                .exists(RecordKind::Ciphertext, &self.layout.ciphertext(file_hash))
                .await?)
    }

    pub async fn put_ciphertext(
        &self,
        file_hash: &ContentHash,
        cipher: &SymbolSequence,
    ) -> CdnaResult<()> {
        let key = self.layout.ciphertext(file_hash);
        self.op
            .write(&key, cipher.to_ascii())
            .await
            .map_err(|e| map_err(RecordKind::Ciphertext, &key, e))?;
        Ok(())
    }

    /// Raw ciphertext bytes, unparsed
    pub async fn ciphertext(&self, file_hash: &ContentHash) -> CdnaResult<Vec<u8>> {
        self.read(RecordKind::Ciphertext, &self.layout.ciphertext(file_hash))
            .await
    }

    /// Hashes of every file with a stored manifest, sorted.
    pub async fn list(&self) -> CdnaResult<Vec<ContentHash>> {
        let dir = self.layout.manifests_dir();
        let entries = match self.op.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_err(RecordKind::Manifest, &dir, e)),
        };
        let mut hashes: Vec<ContentHash> = entries
            .iter()
            .filter_map(|e| Layout::file_hash_from_manifest_name(e.path()))
            .collect();
        hashes.sort_by_key(|h| h.to_hex());
        hashes.dedup();
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdna_chunks::hash_bytes;
    use cdna_core::{ChunkRef, HashAlgorithm};

    fn records() -> RecordStore {
        RecordStore::new(cdna_storage::memory_operator().unwrap(), Layout::new("r"))
    }

    fn manifest_for(data: &[u8], filename: &str) -> Manifest {
        let hash = hash_bytes(HashAlgorithm::Sha512_256, data).to_hex();
        Manifest {
            version: crate::manifest::MANIFEST_VERSION,
            filename: filename.into(),
            file_size: data.len() as u64,
            file_hash: hash.clone(),
            hash_algorithm: HashAlgorithm::Sha512_256,
            chunk_size_bytes: 1024,
            fragments: vec![ChunkRef {
                index: 0,
                offset: 0,
                size: data.len() as u64,
                chunk_hash: hash,
            }],
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn manifest_is_write_once() {
        let records = records();
        let first = manifest_for(b"content", "first.txt");
        let second = manifest_for(b"content", "second.txt");

        assert_eq!(records.put_manifest(&first).await.unwrap(), RecordWrite::Created);
        assert_eq!(
            records.put_manifest(&second).await.unwrap(),
            RecordWrite::AlreadyPresent
        );

        let stored = records.manifest(&first.content_hash().unwrap()).await.unwrap();
        assert_eq!(stored.filename, "first.txt");
    }

    #[tokio::test]
    async fn absent_records_are_not_found() {
        let records = records();
        let h = hash_bytes(HashAlgorithm::Sha512_256, b"nothing");
        assert!(matches!(
            records.manifest(&h).await.unwrap_err(),
            CdnaError::NotFound {
                kind: RecordKind::Manifest,
                ..
            }
        ));
        assert!(matches!(
            records.metadata(&h).await.unwrap_err(),
            CdnaError::NotFound {
                kind: RecordKind::EncryptionMetadata,
                ..
            }
        ));
        assert!(matches!(
            records.ciphertext(&h).await.unwrap_err(),
            CdnaError::NotFound {
                kind: RecordKind::Ciphertext,
                ..
            }
        ));
        assert!(!records.has_encrypted_artifact(&h).await.unwrap());
    }

    #[tokio::test]
    async fn manifest_under_wrong_key_is_malformed() {
        let records = records();
        let m = manifest_for(b"real", "real.txt");
        let other = hash_bytes(HashAlgorithm::Sha512_256, b"other");
        let key = records.layout().manifest(&other);
        records
            .op
            .write(&key, m.to_bytes().unwrap())
            .await
            .unwrap();
        assert!(matches!(
            records.manifest(&other).await.unwrap_err(),
            CdnaError::MalformedRecord { .. }
        ));
    }

    #[tokio::test]
    async fn list_returns_stored_manifests() {
        let records = records();
        assert!(records.list().await.unwrap().is_empty());

        let a = manifest_for(b"a", "a");
        let b = manifest_for(b"b", "b");
        records.put_manifest(&a).await.unwrap();
        records.put_manifest(&b).await.unwrap();

        let listed = records.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a.content_hash().unwrap()));
        assert!(listed.contains(&b.content_hash().unwrap()));
    }

    #[tokio::test]
    async fn ciphertext_stored_as_ascii() {
        let records = records();
        let h = hash_bytes(HashAlgorithm::Sha512_256, b"x");
        let seq: SymbolSequence = "GATTACA".parse().unwrap();
        records.put_ciphertext(&h, &seq).await.unwrap();
        assert_eq!(records.ciphertext(&h).await.unwrap(), b"GATTACA");
    }
}
