//! Byte ↔ base codec
//!
//! Each byte becomes four bases, most-significant bit pair first:
//! `00→A, 01→T, 10→C, 11→G`. Decoding is the exact inverse and needs a
//! sequence whose length is a multiple of four.

use cdna_core::{CdnaError, CdnaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One quaternary symbol. The discriminant is both the 2-bit value and the
/// cipher index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Base {
    A = 0,
    T = 1,
    C = 2,
    G = 3,
}

impl Base {
    pub const ALL: [Base; 4] = [Base::A, Base::T, Base::C, Base::G];

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Base for the low two bits of `i`
    pub fn from_index(i: u8) -> Base {
        Self::ALL[(i & 0b11) as usize]
    }

    pub fn as_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::T => 'T',
            Base::C => 'C',
            Base::G => 'G',
        }
    }

    pub fn from_char(c: char) -> Option<Base> {
        match c {
            'A' => Some(Base::A),
            'T' => Some(Base::T),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            _ => None,
        }
    }
}

/// Count of each base in a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDistribution {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "T")]
    pub t: u64,
    #[serde(rename = "C")]
    pub c: u64,
    #[serde(rename = "G")]
    pub g: u64,
}

impl BaseDistribution {
    pub fn total(&self) -> u64 {
        self.a + self.t + self.c + self.g
    }

    fn bump(&mut self, base: Base) {
        match base {
            Base::A => self.a += 1,
            Base::T => self.t += 1,
            Base::C => self.c += 1,
            Base::G => self.g += 1,
        }
    }
}

/// An ordered sequence of bases. Holding only `Base` values, it cannot
/// contain an out-of-alphabet symbol; those are rejected when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSequence(Vec<Base>);

impl SymbolSequence {
    pub fn from_bases(bases: Vec<Base>) -> Self {
        Self(bases)
    }

    pub fn as_slice(&self) -> &[Base] {
        &self.0
    }

    pub fn into_bases(self) -> Vec<Base> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Base> + '_ {
        self.0.iter().copied()
    }

    pub fn distribution(&self) -> BaseDistribution {
        let mut dist = BaseDistribution::default();
        for base in &self.0 {
            dist.bump(*base);
        }
        dist
    }

    /// Parse ASCII text, failing on the first byte outside `ATCG`.
    pub fn from_ascii(bytes: &[u8]) -> CdnaResult<Self> {
        bytes
            .iter()
            .enumerate()
            .map(|(position, &b)| {
                Base::from_char(char::from(b)).ok_or(CdnaError::InvalidSymbol {
                    position,
                    symbol: char::from(b),
                })
            })
            .collect::<CdnaResult<Vec<_>>>()
            .map(Self)
    }

    /// ASCII rendering, one byte per base
    pub fn to_ascii(&self) -> Vec<u8> {
        self.0.iter().map(|b| b.as_char() as u8).collect()
    }
}

impl fmt::Display for SymbolSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.0.iter().map(|b| b.as_char()).collect();
        f.write_str(&s)
    }
}

impl FromStr for SymbolSequence {
    type Err = CdnaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(position, symbol)| {
                Base::from_char(symbol).ok_or(CdnaError::InvalidSymbol { position, symbol })
            })
            .collect::<CdnaResult<Vec<_>>>()
            .map(Self)
    }
}

impl FromIterator<Base> for SymbolSequence {
    fn from_iter<I: IntoIterator<Item = Base>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encode bytes as bases, four per byte, MSB pair first.
pub fn encode(bytes: &[u8]) -> SymbolSequence {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    for &byte in bytes {
        for shift in [6u8, 4, 2, 0] {
            out.push(Base::from_index(byte >> shift));
        }
    }
    SymbolSequence(out)
}

/// Decode bases back into bytes.
pub fn decode(symbols: &SymbolSequence) -> CdnaResult<Vec<u8>> {
    if symbols.len() % 4 != 0 {
        return Err(CdnaError::invalid_format(format!(
            "symbol count {} is not a multiple of 4",
            symbols.len()
        )));
    }
    Ok(symbols
        .0
        .chunks_exact(4)
        .map(|quad| {
            quad.iter()
                .fold(0u8, |acc, base| (acc << 2) | base.index())
        })
        .collect())
}
