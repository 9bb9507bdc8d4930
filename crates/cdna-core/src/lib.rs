pub mod config;
pub mod error;
pub mod types;

pub use error::{CdnaError, CdnaResult};
pub use types::{ChunkRef, HashAlgorithm, RecordKind};
