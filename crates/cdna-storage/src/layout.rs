//! Object key layout
//!
//! ```text
//! {prefix}/chunks/{chunk_hash}
//! {prefix}/manifests/{file_hash}.json
//! {prefix}/encrypted/{file_hash}.meta.json
//! {prefix}/encrypted/{file_hash}.dna
//! ```
//!
//! Every record is keyed by the whole-file hash, never by filename, so two
//! uploads that share a name cannot overwrite each other.

use cdna_chunks::ContentHash;

const MANIFEST_SUFFIX: &str = ".json";

/// Key builder bound to one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    prefix: String,
}

impl Layout {
    /// Normalize a prefix: no leading or trailing slash
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn join(&self, rest: &str) -> String {
        if self.prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{rest}", self.prefix)
        }
    }

    pub fn chunk(&self, hash: &ContentHash) -> String {
        self.join(&format!("chunks/{hash}"))
    }

    pub fn manifests_dir(&self) -> String {
        self.join("manifests/")
    }

    pub fn manifest(&self, file_hash: &ContentHash) -> String {
        self.join(&format!("manifests/{file_hash}{MANIFEST_SUFFIX}"))
    }

    pub fn metadata(&self, file_hash: &ContentHash) -> String {
        self.join(&format!("encrypted/{file_hash}.meta.json"))
    }

    pub fn ciphertext(&self, file_hash: &ContentHash) -> String {
        self.join(&format!("encrypted/{file_hash}.dna"))
    }

    /// Recover the file hash from a manifest object name, if it is one
    pub fn file_hash_from_manifest_name(name: &str) -> Option<ContentHash> {
        let base = name.rsplit('/').next()?;
        let stem = base.strip_suffix(MANIFEST_SUFFIX)?;
        ContentHash::from_hex(stem).ok()
    }
}
