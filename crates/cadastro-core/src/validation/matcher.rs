//! Possible-duplicate detection.
//!
//! A stored record is a possible duplicate of the candidate when the
//! normalized full names are equal AND either the normalized mother
//! names or the birth dates are equal. A field missing on either side
//! never satisfies its clause. Matches are advisory and are always
//! shown to a person; nothing is merged.

use chrono::NaiveDate;

use crate::models::{PatientIdentity, StoredPatient};

/// Trim and case-fold a name for comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn optional_names_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = normalize_name(a);
            !a.is_empty() && a == normalize_name(b)
        }
        _ => false,
    }
}

fn dates_equal(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Whether `stored` is a possible duplicate of `candidate`.
pub fn is_possible_duplicate(candidate: &PatientIdentity, stored: &PatientIdentity) -> bool {
    if normalize_name(&candidate.full_name) != normalize_name(&stored.full_name) {
        return false;
    }

    optional_names_equal(candidate.mother_name.as_deref(), stored.mother_name.as_deref())
        || dates_equal(candidate.birth_date, stored.birth_date)
}

/// Scan a store snapshot for possible duplicates, preserving store order.
pub fn find_possible_duplicates<'a>(
    candidate: &PatientIdentity,
    store: &'a [StoredPatient],
) -> Vec<&'a StoredPatient> {
    store
        .iter()
        .filter(|stored| is_possible_duplicate(candidate, &stored.identity))
        .collect()
}
