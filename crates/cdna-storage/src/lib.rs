//! cdna-storage: OpenDAL storage backends + content-addressed chunk store

pub mod cas;
pub mod layout;
pub mod operator;

pub use cas::{ContentStore, PutOutcome, PutResult};
pub use operator::{build_operator, check_health, memory_operator, S3Credentials};

/// Map an OpenDAL error onto the cdna taxonomy, keeping NotFound distinct.
pub fn storage_error(
    kind: cdna_core::RecordKind,
    key: &str,
    err: opendal::Error,
) -> cdna_core::CdnaError {
    if err.kind() == opendal::ErrorKind::NotFound {
        cdna_core::CdnaError::not_found(kind, key)
    } else {
        cdna_core::CdnaError::Storage(format!("{kind} {key}: {err}"))
    }
}
