//! Building store queries from what the user typed.

use cadastro_core::store::DEFAULT_SEARCH_LIMIT;
use cadastro_core::{SearchField, SearchQuery, ValidationConfig};

/// Digits in a complete CPF.
const CPF_DIGITS: usize = 11;

/// Minimum input size and result limit for search-as-you-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    pub min_chars: usize,
    pub limit: usize,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            min_chars: 3,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl QueryPolicy {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            min_chars: config.search_min_chars,
            limit: config.search_limit,
        }
    }

    /// Build a query for `input`, or `None` while the input is too short.
    ///
    /// When `field` is not given it is inferred with [`infer_field`].
    pub fn build(&self, input: &str, field: Option<SearchField>) -> Option<SearchQuery> {
        let field = field.unwrap_or_else(|| infer_field(input));
        let query = SearchQuery::new(input, field).with_limit(self.limit);
        if query.text.chars().count() < self.min_chars {
            return None;
        }
        Some(query)
    }
}

/// Guess the field a free-text input targets.
///
/// Anything with a letter is a name. Digit-only input (masks allowed) is a
/// CPF up to 11 digits and a CNS beyond that.
pub fn infer_field(input: &str) -> SearchField {
    if input.chars().any(char::is_alphabetic) {
        return SearchField::Name;
    }
    let digits = input.chars().filter(char::is_ascii_digit).count();
    match digits {
        0 => SearchField::Name,
        n if n <= CPF_DIGITS => SearchField::Cpf,
        _ => SearchField::Cns,
    }
}
