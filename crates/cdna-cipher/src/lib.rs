//! cdna-cipher: reversible DNA-symbol obfuscation
//!
//! Pipeline: compressed bytes → symbol codec (2 bits per base) → mod-4
//! substitution keyed by a logistic-map stream → ciphertext bases
//!
//! ```text
//! byte 0b01_10_11_00  →  T C G A
//! key  x ← r·x·(1−x), k = ⌊4x⌋ ∈ {0,1,2,3}
//! enc  (base + k) mod 4      dec  (base − k + 4) mod 4
//! ```
//!
//! This is an obfuscation layer, not a cryptographic primitive: the only
//! secret is the pair (x0, r), stored alongside the ciphertext.

pub mod keystream;
pub mod substitution;
pub mod symbol;

pub use keystream::{ChaoticParams, KeyStream, KeyStreamIter, LogisticMap};
pub use substitution::{decrypt, decrypt_with, encrypt, encrypt_with};
pub use symbol::{decode, encode, Base, BaseDistribution, SymbolSequence};
