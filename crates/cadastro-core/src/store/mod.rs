//! Patient store interface.
//!
//! The registry is owned by a collaborator (local SQLite, a remote
//! service, or fixtures in tests). Validation code receives it through
//! [`PatientStore`] and never reaches for a global.

mod memory;

pub use memory::*;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use thiserror::Error;
use tracing::debug;

use crate::db::{Database, DbError};
use crate::models::{PatientIdentity, StoredPatient};
use crate::validation::normalize_name;

/// Default number of results per search.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Store errors. Propagated to the caller as-is, never retried here.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which field a search query targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Name,
    /// National health card number
    Cns,
    /// Taxpayer registry number
    Cpf,
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchField::Name => "name",
            SearchField::Cns => "cns",
            SearchField::Cpf => "cpf",
        })
    }
}

/// A normalized search request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    /// Lowercase trimmed name, or bare digits for document fields
    pub text: String,
    pub field: SearchField,
    pub limit: usize,
}

impl SearchQuery {
    /// Build a query, normalizing `text` for `field`.
    pub fn new(text: &str, field: SearchField) -> Self {
        let text = match field {
            SearchField::Name => normalize_name(text),
            SearchField::Cns | SearchField::Cpf => {
                text.chars().filter(char::is_ascii_digit).collect()
            }
        };
        Self {
            text,
            field,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `patient` satisfies the query filter (ranking aside).
    pub fn matches(&self, patient: &PatientIdentity) -> bool {
        if self.text.is_empty() {
            return false;
        }
        match self.field {
            SearchField::Name => normalize_name(&patient.full_name).contains(&self.text),
            SearchField::Cpf => patient
                .cpf
                .as_ref()
                .is_some_and(|cpf| cpf.digits().starts_with(&self.text)),
            SearchField::Cns => patient
                .cns
                .as_ref()
                .is_some_and(|cns| cns.digits().starts_with(&self.text)),
        }
    }
}

/// Access to the patient registry.
pub trait PatientStore {
    /// Patients matching a query, best first, at most `query.limit`.
    fn search(&self, query: &SearchQuery) -> StoreResult<Vec<StoredPatient>>;

    fn get(&self, id: &str) -> StoreResult<Option<StoredPatient>>;

    /// Persist a record whose id was assigned by the caller.
    fn insert(&self, patient: StoredPatient) -> StoreResult<StoredPatient>;

    /// Persist a validated identity under a fresh id.
    fn create(&self, identity: PatientIdentity) -> StoreResult<StoredPatient> {
        self.insert(StoredPatient::new(identity))
    }

    /// All patients in insertion order, for duplicate detection.
    fn snapshot(&self) -> StoreResult<Vec<StoredPatient>>;
}

impl PatientStore for Database {
    fn search(&self, query: &SearchQuery) -> StoreResult<Vec<StoredPatient>> {
        if query.text.is_empty() {
            return Ok(Vec::new());
        }
        let results = match query.field {
            SearchField::Name => self.search_patients_by_name(&query.text, query.limit)?,
            field => self.search_patients_by_document(field, &query.text, query.limit)?,
        };
        debug!(field = %query.field, results = results.len(), "patient search");
        Ok(results)
    }

    fn get(&self, id: &str) -> StoreResult<Option<StoredPatient>> {
        Ok(self.get_patient(id)?)
    }

    fn insert(&self, patient: StoredPatient) -> StoreResult<StoredPatient> {
        self.insert_patient(&patient)?;
        debug!(id = %patient.id, "patient created");
        Ok(patient)
    }

    fn snapshot(&self) -> StoreResult<Vec<StoredPatient>> {
        Ok(self.list_patients()?)
    }
}

/// Order name-search hits: prefix matches first, then substring matches,
/// each group by Jaro-Winkler similarity to the query. Ties keep input order.
pub fn rank_by_name(normalized_query: &str, patients: Vec<StoredPatient>) -> Vec<StoredPatient> {
    let mut scored: Vec<(f64, StoredPatient)> = patients
        .into_iter()
        .map(|p| (name_score(normalized_query, &p.identity.full_name), p))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, p)| p).collect()
}

fn name_score(normalized_query: &str, full_name: &str) -> f64 {
    let name = normalize_name(full_name);
    let similarity = jaro_winkler(normalized_query, &name);

    if name.starts_with(normalized_query) {
        2.0 + similarity
    } else if name.contains(normalized_query) {
        1.0 + similarity
    } else {
        similarity
    }
}
