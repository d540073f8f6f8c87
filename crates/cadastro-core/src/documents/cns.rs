//! CNS (Cartão Nacional de Saúde).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{digits_to_string, extract_digits, DocumentError, DocumentResult};

const KIND: &str = "CNS";
const LENGTH: usize = 15;

/// Whether a CNS was issued as definitive (PIS-derived) or provisional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CnsKind {
    Definitive,
    Provisional,
}

/// A validated CNS, stored as its 15 bare digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cns(String);

impl Cns {
    /// Parse a CNS from masked (`123 4567 8901 0000`) or bare input.
    pub fn parse(raw: &str) -> DocumentResult<Self> {
        let digits = extract_digits(KIND, raw)?;
        if digits.len() != LENGTH {
            return Err(DocumentError::WrongLength {
                kind: KIND,
                expected: LENGTH,
                actual: digits.len(),
            });
        }

        let valid = match digits[0] {
            1 | 2 => definitive_matches(&digits),
            7..=9 => weighted_sum(&digits) % 11 == 0,
            prefix => return Err(DocumentError::InvalidPrefix { kind: KIND, prefix }),
        };

        if !valid {
            return Err(DocumentError::BadCheckDigits { kind: KIND });
        }

        Ok(Self(digits_to_string(&digits)))
    }

    /// Bare digits.
    pub fn digits(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> CnsKind {
        if self.0.starts_with('1') || self.0.starts_with('2') {
            CnsKind::Definitive
        } else {
            CnsKind::Provisional
        }
    }

    /// Display mask: `000 0000 0000 0000`.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!("{} {} {} {}", &d[0..3], &d[3..7], &d[7..11], &d[11..15])
    }
}

fn weighted_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * (15 - i as u32))
        .sum()
}

/// Definitive numbers are the 11-digit PIS followed by a fixed infix and
/// a check digit; rebuild the expected suffix and compare.
fn definitive_matches(digits: &[u8]) -> bool {
    let pis = &digits[..11];
    let mut sum = weighted_sum(pis);
    let mut dv = 11 - sum % 11;
    if dv == 11 {
        dv = 0;
    }

    let expected: [u8; 4] = if dv == 10 {
        sum += 2;
        let dv = 11 - sum % 11;
        [0, 0, 1, dv as u8]
    } else {
        [0, 0, 0, dv as u8]
    };

    digits[11..] == expected
}

impl fmt::Display for Cns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for Cns {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Cns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cns::parse(&raw).map_err(serde::de::Error::custom)
    }
}
