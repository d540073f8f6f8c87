//! Brazilian identity documents.
//!
//! - [`Cpf`]: individual taxpayer registry number (11 digits, two check digits)
//! - [`Cns`]: national health card number (15 digits, mod-11 weighted sum)
//!
//! Both types only exist in validated form; parsing strips the usual
//! punctuation masks before checking.

mod cns;
mod cpf;

pub use cns::*;
pub use cpf::*;

use thiserror::Error;

/// Document parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("{kind} must have {expected} digits, got {actual}")]
    WrongLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} contains invalid character '{found}'")]
    InvalidCharacter { kind: &'static str, found: char },

    #[error("{kind} check digits do not match")]
    BadCheckDigits { kind: &'static str },

    #[error("{kind} has an invalid prefix digit {prefix}")]
    InvalidPrefix { kind: &'static str, prefix: u8 },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Strip mask punctuation and whitespace, returning the bare digits.
///
/// Accepted separators are `.`, `-`, `/` and whitespace; anything else
/// is rejected.
pub(crate) fn extract_digits(kind: &'static str, raw: &str) -> DocumentResult<Vec<u8>> {
    let mut digits = Vec::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' => digits.push(c as u8 - b'0'),
            '.' | '-' | '/' => {}
            c if c.is_whitespace() => {}
            other => {
                return Err(DocumentError::InvalidCharacter { kind, found: other });
            }
        }
    }
    Ok(digits)
}

pub(crate) fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_digits_strips_mask() {
        let digits = extract_digits("CPF", " 111.444.777-35 ").unwrap();
        assert_eq!(digits_to_string(&digits), "11144477735");
    }

    #[test]
    fn test_extract_digits_rejects_letters() {
        let err = extract_digits("CPF", "111.444.777-3X").unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidCharacter {
                kind: "CPF",
                found: 'X'
            }
        );
    }
}
