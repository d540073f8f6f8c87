//! In-memory patient store, for tests and offline fixtures.

use std::sync::RwLock;

use crate::models::StoredPatient;

use super::{rank_by_name, PatientStore, SearchField, StoreError, StoreResult};

/// A `Vec`-backed store that keeps insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    patients: RwLock<Vec<StoredPatient>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_patients(patients: Vec<StoredPatient>) -> Self {
        Self {
            patients: RwLock::new(patients),
        }
    }

    pub fn len(&self) -> usize {
        self.patients.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("store lock poisoned".into())
}

impl PatientStore for InMemoryStore {
    fn search(&self, query: &super::SearchQuery) -> StoreResult<Vec<StoredPatient>> {
        let patients = self.patients.read().map_err(poisoned)?;
        let hits: Vec<StoredPatient> = patients
            .iter()
            .filter(|p| query.matches(&p.identity))
            .cloned()
            .collect();

        let mut results = match query.field {
            SearchField::Name => rank_by_name(&query.text, hits),
            SearchField::Cns | SearchField::Cpf => hits,
        };
        results.truncate(query.limit);
        Ok(results)
    }

    fn get(&self, id: &str) -> StoreResult<Option<StoredPatient>> {
        let patients = self.patients.read().map_err(poisoned)?;
        Ok(patients.iter().find(|p| p.id == id).cloned())
    }

    fn insert(&self, patient: StoredPatient) -> StoreResult<StoredPatient> {
        let mut patients = self.patients.write().map_err(poisoned)?;
        if patients.iter().any(|p| p.id == patient.id) {
            return Err(StoreError::Rejected(format!(
                "patient {} already exists",
                patient.id
            )));
        }
        patients.push(patient.clone());
        Ok(patient)
    }

    fn snapshot(&self) -> StoreResult<Vec<StoredPatient>> {
        Ok(self.patients.read().map_err(poisoned)?.clone())
    }
}
