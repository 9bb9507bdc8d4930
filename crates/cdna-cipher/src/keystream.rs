//! Logistic-map key stream
//!
//! `x(n+1) = r · x(n) · (1 − x(n))`, emitting `⌊4·x(n+1)⌋` per symbol.
//!
//! The recurrence is strictly sequential, so the stream is an iterator that
//! can be restarted from its seed at any time rather than a buffer that has
//! to be kept around. The product is evaluated as `(r·x)·(1−x)` with no fused
//! multiply-add, which keeps streams bit-identical across platforms and with
//! artifacts written by earlier deployments.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Interior clamp for x0; 0 and 1 are fixed points of the map.
pub const X0_MIN: f64 = 0.0001;
pub const X0_MAX: f64 = 0.9999;

/// Growth rates in this band produce non-periodic orbits.
pub const CHAOTIC_R_MIN: f64 = 3.57;
pub const CHAOTIC_R_MAX: f64 = 4.0;

/// Seed pair for a key stream.
///
/// Serialized as 16-hex-digit IEEE-754 bit patterns, so a stored pair
/// reproduces the exact same stream. Decimal JSON numbers are still accepted
/// when reading. Deserialized pairs go through [`ChaoticParams::new`], so x0
/// is clamped on every read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredParams")]
pub struct ChaoticParams {
    #[serde(serialize_with = "fixed_f64::serialize")]
    x0: f64,
    #[serde(serialize_with = "fixed_f64::serialize")]
    r: f64,
}

/// Wire form of [`ChaoticParams`] before clamping
#[derive(Deserialize)]
struct StoredParams {
    #[serde(deserialize_with = "fixed_f64::deserialize")]
    x0: f64,
    #[serde(deserialize_with = "fixed_f64::deserialize")]
    r: f64,
}

impl From<StoredParams> for ChaoticParams {
    fn from(stored: StoredParams) -> Self {
        Self::new(stored.x0, stored.r)
    }
}

impl ChaoticParams {
    /// Build a seed pair, clamping x0 into `[X0_MIN, X0_MAX]` (NaN becomes
    /// `X0_MIN`). `r` is taken as given; see [`ChaoticParams::is_chaotic`].
    pub fn new(x0: f64, r: f64) -> Self {
        let x0 = if x0.is_nan() {
            X0_MIN
        } else {
            x0.clamp(X0_MIN, X0_MAX)
        };
        if !(CHAOTIC_R_MIN..CHAOTIC_R_MAX).contains(&r) {
            tracing::debug!(r, "growth rate outside the chaotic band");
        }
        Self { x0, r }
    }

    /// Draw a fresh x0 uniformly from the clamp interval.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, r: f64) -> Self {
        Self::new(rng.gen_range(X0_MIN..X0_MAX), r)
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn is_chaotic(&self) -> bool {
        (CHAOTIC_R_MIN..CHAOTIC_R_MAX).contains(&self.r)
    }

    /// Unbounded iterator starting from the seed
    pub fn map(&self) -> LogisticMap {
        LogisticMap {
            x: self.x0,
            r: self.r,
        }
    }

    /// Lazy stream of exactly `len` key values
    pub fn stream(&self, len: usize) -> KeyStreamIter {
        KeyStreamIter {
            map: self.map(),
            remaining: len,
        }
    }
}

/// Unbounded logistic-map orbit, yielding key values in `0..=3`
#[derive(Debug, Clone)]
pub struct LogisticMap {
    x: f64,
    r: f64,
}

impl LogisticMap {
    /// Current state (the last value the orbit reached)
    pub fn state(&self) -> f64 {
        self.x
    }
}

impl Iterator for LogisticMap {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.x = self.r * self.x * (1.0 - self.x);
        // NaN (only reachable for out-of-band r) casts to 0
        Some((self.x * 4.0).floor().clamp(0.0, 3.0) as u8)
    }
}

impl FusedIterator for LogisticMap {}

/// Finite key stream of known length
#[derive(Debug, Clone)]
pub struct KeyStreamIter {
    map: LogisticMap,
    remaining: usize,
}

impl Iterator for KeyStreamIter {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.map.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for KeyStreamIter {}
impl FusedIterator for KeyStreamIter {}

/// A materialized key stream, for callers that decrypt more than once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStream(Vec<u8>);

impl KeyStream {
    pub fn generate(len: usize, params: &ChaoticParams) -> Self {
        Self(params.stream(len).collect())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Serde adapter: f64 as its 64-bit pattern in hex. Reads either that or a
/// plain JSON number.
mod fixed_f64 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:016x}", v.to_bits()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        d.deserialize_any(FixedF64Visitor)
    }

    struct FixedF64Visitor;

    impl<'de> Visitor<'de> for FixedF64Visitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a 16-digit hex f64 bit pattern or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            let digits = v.strip_prefix("0x").unwrap_or(v);
            if digits.len() != 16 {
                return Err(E::custom(format!("expected 16 hex digits, got '{v}'")));
            }
            u64::from_str_radix(digits, 16)
                .map(f64::from_bits)
                .map_err(|e| E::custom(format!("invalid f64 bit pattern '{v}': {e}")))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }
    }
}
