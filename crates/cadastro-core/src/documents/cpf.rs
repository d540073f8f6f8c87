//! CPF (Cadastro de Pessoas Físicas).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{digits_to_string, extract_digits, DocumentError, DocumentResult};

const KIND: &str = "CPF";
const LENGTH: usize = 11;

/// A validated CPF, stored as its 11 bare digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpf(String);

impl Cpf {
    /// Parse a CPF from masked (`111.444.777-35`) or bare input.
    pub fn parse(raw: &str) -> DocumentResult<Self> {
        let digits = extract_digits(KIND, raw)?;
        if digits.len() != LENGTH {
            return Err(DocumentError::WrongLength {
                kind: KIND,
                expected: LENGTH,
                actual: digits.len(),
            });
        }

        // 000.000.000-00, 111.111.111-11, ... pass the checksum but are never issued
        if digits.iter().all(|d| *d == digits[0]) {
            return Err(DocumentError::BadCheckDigits { kind: KIND });
        }

        let first = check_digit(&digits[..9]);
        let second = check_digit(&digits[..10]);
        if digits[9] != first || digits[10] != second {
            return Err(DocumentError::BadCheckDigits { kind: KIND });
        }

        Ok(Self(digits_to_string(&digits)))
    }

    /// Build a valid CPF from its 9-digit base by appending the check digits.
    pub fn from_base(base: [u8; 9]) -> DocumentResult<Self> {
        let mut digits = base.to_vec();
        digits.push(check_digit(&digits));
        digits.push(check_digit(&digits));
        Self::parse(&digits_to_string(&digits))
    }

    /// Bare digits.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Display mask: `000.000.000-00`.
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
    }
}

/// Mod-11 check digit over a prefix, with weights counting down to 2.
fn check_digit(prefix: &[u8]) -> u8 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * (top - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 {
        0
    } else {
        rest as u8
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for Cpf {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Cpf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cpf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cpf::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        for raw in ["111.444.777-35", "11144477735", "529.982.247-25", "935.411.347-80"] {
            assert!(Cpf::parse(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn test_formatted() {
        let cpf = Cpf::parse("11144477735").unwrap();
        assert_eq!(cpf.digits(), "11144477735");
        assert_eq!(cpf.formatted(), "111.444.777-35");
        assert_eq!(cpf.to_string(), "111.444.777-35");
    }

    #[test]
    fn test_wrong_check_digits() {
        assert_eq!(
            Cpf::parse("111.444.777-36"),
            Err(DocumentError::BadCheckDigits { kind: "CPF" })
        );
    }

    #[test]
    fn test_repeated_digits_rejected() {
        assert!(Cpf::parse("000.000.000-00").is_err());
        assert!(Cpf::parse("99999999999").is_err());
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            Cpf::parse("1114447773"),
            Err(DocumentError::WrongLength {
                kind: "CPF",
                expected: 11,
                actual: 10
            })
        );
    }

    #[test]
    fn test_from_base() {
        let cpf = Cpf::from_base([1, 1, 1, 4, 4, 4, 7, 7, 7]).unwrap();
        assert_eq!(cpf.digits(), "11144477735");
    }

    #[test]
    fn test_serde_roundtrip_uses_digits() {
        let cpf = Cpf::parse("529.982.247-25").unwrap();
        let json = serde_json::to_string(&cpf).unwrap();
        assert_eq!(json, "\"52998224725\"");

        let bad: Result<Cpf, _> = serde_json::from_str("\"52998224726\"");
        assert!(bad.is_err());
    }
}
