//! OpenDAL Operator factory for cdna storage backends

use anyhow::{Context, Result};
use opendal::Operator;
use std::path::{Path, PathBuf};

use cdna_core::config::StorageConfig;

/// Access keys for the S3 backend
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Build an operator for the configured backend.
///
/// - `fs`: objects live under `storage.root` (`~` is expanded)
/// - `memory`: process-local, lost on exit; for tests and dry runs
/// - `s3`: any S3-compatible endpoint, path-style addressing; requires
///   `credentials`
///
/// If `enforce_tls` is true and an S3 endpoint uses HTTP, this returns an
/// error. Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_operator(
    storage: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> Result<Operator> {
    let op = match storage.backend.as_str() {
        "fs" => {
            let root = expand_tilde(&storage.root);
            let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
            Operator::new(builder)
                .with_context(|| format!("creating fs operator at {}", root.display()))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        "memory" => memory_operator()?,
        "s3" => {
            let creds = credentials.context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
            )?;
            if storage.endpoint.starts_with("http://") {
                if storage.enforce_tls {
                    anyhow::bail!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                        storage.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %storage.endpoint,
                    "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
                );
            }
            let builder = opendal::services::S3::default()
                .endpoint(&storage.endpoint)
                .region(&storage.region)
                .bucket(&storage.bucket)
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            Operator::new(builder)
                .context("creating OpenDAL S3 operator")?
                .layer(opendal::layers::LoggingLayer::default())
                .layer(
                    opendal::layers::RetryLayer::new()
                        .with_max_times(5)
                        .with_jitter(),
                )
                .finish()
        }
        other => anyhow::bail!("unknown storage backend '{other}'"),
    };

    Ok(op)
}

/// In-memory operator
pub fn memory_operator() -> Result<Operator> {
    Ok(Operator::new(opendal::services::Memory::default())
        .context("creating memory operator")?
        .finish())
}

/// Probe the backend by listing its root. Used by `cdna status`.
pub async fn check_health(op: &Operator) -> Result<()> {
    op.list("/").await.with_context(|| {
        let info = op.info();
        format!("listing {} root {}", info.scheme(), info.root())
    })?;
    Ok(())
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}
