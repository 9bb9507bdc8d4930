//! Mod-4 additive substitution over base sequences
//!
//! With alphabet order `A=0, T=1, C=2, G=3`:
//! - encrypt: `(base + k) mod 4`
//! - decrypt: `(base − k + 4) mod 4`
//!
//! Both directions require exactly one key value per base.

use cdna_core::{CdnaError, CdnaResult};

use crate::keystream::{ChaoticParams, KeyStream};
use crate::symbol::{Base, SymbolSequence};

#[derive(Debug, Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

fn substitute<K>(seq: &SymbolSequence, keys: K, direction: Direction) -> CdnaResult<SymbolSequence>
where
    K: ExactSizeIterator<Item = u8>,
{
    if seq.len() != keys.len() {
        tracing::error!(
            symbols = seq.len(),
            keys = keys.len(),
            "key stream length does not match symbol sequence; this is a caller bug"
        );
        return Err(CdnaError::LengthMismatch {
            symbols: seq.len(),
            keys: keys.len(),
        });
    }

    Ok(seq
        .iter()
        .zip(keys)
        .map(|(base, k)| {
            let k = k % 4;
            let shifted = match direction {
                Direction::Encrypt => base.index() + k,
                Direction::Decrypt => base.index() + 4 - k,
            };
            Base::from_index(shifted % 4)
        })
        .collect())
}

/// Encrypt with a materialized key stream
pub fn encrypt(seq: &SymbolSequence, key: &KeyStream) -> CdnaResult<SymbolSequence> {
    substitute(seq, key.as_slice().iter().copied(), Direction::Encrypt)
}

/// Decrypt with a materialized key stream
pub fn decrypt(seq: &SymbolSequence, key: &KeyStream) -> CdnaResult<SymbolSequence> {
    substitute(seq, key.as_slice().iter().copied(), Direction::Decrypt)
}

/// Encrypt, generating the key stream lazily from its seed
pub fn encrypt_with(seq: &SymbolSequence, params: &ChaoticParams) -> CdnaResult<SymbolSequence> {
    substitute(seq, params.stream(seq.len()), Direction::Encrypt)
}

/// Decrypt, generating the key stream lazily from its seed
pub fn decrypt_with(seq: &SymbolSequence, params: &ChaoticParams) -> CdnaResult<SymbolSequence> {
    substitute(seq, params.stream(seq.len()), Direction::Decrypt)
}
