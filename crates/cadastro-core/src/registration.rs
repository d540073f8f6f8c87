//! Patient registration flow.
//!
//! Form → parse → validate against a store snapshot → (acknowledge
//! duplicates) → create. The store snapshot may change between
//! validation and creation; duplicate detection is advisory, so that
//! race is accepted.
//!
//! When the store and the audit log share one [`Database`]
//! ([`Registrar::for_database`]), the patient insert and the
//! acknowledgement append commit together or not at all. With separate
//! backends the patient is stored first and a failed append is reported
//! in [`AcknowledgementStatus::Unrecorded`] instead of as an error, so
//! callers never retry a registration that already happened.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::{Acknowledgement, AcknowledgementBody, AuditError, AuditLog};
use crate::db::{Database, DbError};
use crate::models::{OrchestrationResult, StoredPatient};
use crate::store::{PatientStore, StoreError};
use crate::validation::{CandidateForm, ValidationError, Validator};

/// Registration errors.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl From<DbError> for RegistrationError {
    fn from(e: DbError) -> Self {
        RegistrationError::Store(e.into())
    }
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Whether the duplicate acknowledgement for a registration was logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcknowledgementStatus {
    /// No possible duplicates were shown
    NotNeeded,
    Recorded(Acknowledgement),
    /// The patient was stored but the acknowledgement could not be logged
    Unrecorded { reason: String },
}

impl AcknowledgementStatus {
    pub fn recorded(&self) -> Option<&Acknowledgement> {
        match self {
            AcknowledgementStatus::Recorded(ack) => Some(ack),
            _ => None,
        }
    }
}

/// What happened to a registration attempt.
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// The document policy refused the form; nothing was stored
    Blocked(OrchestrationResult),
    /// Possible duplicates were found and nobody acknowledged them yet
    NeedsAcknowledgement(OrchestrationResult),
    /// The patient was created
    Registered {
        patient: StoredPatient,
        result: OrchestrationResult,
        acknowledgement: AcknowledgementStatus,
    },
}

impl RegistrationOutcome {
    pub fn validation(&self) -> &OrchestrationResult {
        match self {
            RegistrationOutcome::Blocked(result)
            | RegistrationOutcome::NeedsAcknowledgement(result)
            | RegistrationOutcome::Registered { result, .. } => result,
        }
    }

    pub fn patient(&self) -> Option<&StoredPatient> {
        match self {
            RegistrationOutcome::Registered { patient, .. } => Some(patient),
            _ => None,
        }
    }
}

/// Runs the registration flow against an injected store.
pub struct Registrar<'a, S: PatientStore + ?Sized> {
    store: &'a S,
    validator: Validator,
    audit: Option<AuditLog<'a>>,
    /// Set when store and audit log live in this database
    shared: Option<&'a Database>,
}

impl<'a> Registrar<'a, Database> {
    /// Store patients and acknowledgements in `db`, atomically.
    pub fn for_database(db: &'a Database, validator: Validator) -> Self {
        Self {
            store: db,
            validator,
            audit: Some(AuditLog::new(db)),
            shared: Some(db),
        }
    }
}

impl<'a, S: PatientStore + ?Sized> Registrar<'a, S> {
    pub fn new(store: &'a S, validator: Validator) -> Self {
        Self {
            store,
            validator,
            audit: None,
            shared: None,
        }
    }

    /// Record duplicate acknowledgements in `audit`.
    pub fn with_audit_log(mut self, audit: AuditLog<'a>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate a form against the store without creating anything.
    pub fn check(&self, form: &CandidateForm, now: NaiveDate) -> RegistrationResult<OrchestrationResult> {
        let candidate = form.parse(now)?;
        let snapshot = self.store.snapshot()?;
        Ok(self
            .validator
            .validate_and_prepare_patient(&candidate, &snapshot, now))
    }

    /// Register a patient.
    ///
    /// `acknowledged_by` names the user who reviewed the duplicate
    /// warnings; without it, any possible duplicate stops the flow.
    pub fn register(
        &self,
        form: &CandidateForm,
        acknowledged_by: Option<&str>,
        now: NaiveDate,
    ) -> RegistrationResult<RegistrationOutcome> {
        let candidate = form.parse(now)?;
        let snapshot = self.store.snapshot()?;
        let result = self
            .validator
            .validate_and_prepare_patient(&candidate, &snapshot, now);

        if !result.can_submit {
            return Ok(RegistrationOutcome::Blocked(result));
        }

        let acknowledged_by = acknowledged_by.map(str::trim).filter(|u| !u.is_empty());
        let matched: Vec<String> = result
            .duplicate_ids()
            .into_iter()
            .map(str::to_string)
            .collect();

        let patient = StoredPatient::new(candidate);
        let body = match acknowledged_by {
            _ if matched.is_empty() => None,
            None => return Ok(RegistrationOutcome::NeedsAcknowledgement(result)),
            Some(user) => {
                let mut body = AcknowledgementBody::new(
                    patient.identity.full_name.clone(),
                    patient.identity.birth_date,
                    matched,
                    user,
                );
                body.created_patient_id = Some(patient.id.clone());
                Some(body)
            }
        };

        let (patient, acknowledgement) = match (self.shared, body) {
            (Some(db), Some(body)) => insert_with_acknowledgement(db, patient, &body)?,
            (_, body) => {
                let patient = self.store.insert(patient)?;
                let acknowledgement = self.record_after_insert(&patient, body);
                (patient, acknowledgement)
            }
        };
        info!(
            id = %patient.id,
            acknowledged = acknowledgement.recorded().is_some(),
            "patient registered"
        );

        Ok(RegistrationOutcome::Registered {
            patient,
            result,
            acknowledgement,
        })
    }

    fn record_after_insert(
        &self,
        patient: &StoredPatient,
        body: Option<AcknowledgementBody>,
    ) -> AcknowledgementStatus {
        let Some(body) = body else {
            return AcknowledgementStatus::NotNeeded;
        };
        let Some(audit) = &self.audit else {
            warn!(id = %patient.id, "duplicate acknowledgement not recorded: no audit log");
            return AcknowledgementStatus::Unrecorded {
                reason: "no audit log configured".into(),
            };
        };

        match audit.record(&body) {
            Ok(ack) => AcknowledgementStatus::Recorded(ack),
            Err(e) => {
                error!(id = %patient.id, error = %e, "duplicate acknowledgement not recorded");
                AcknowledgementStatus::Unrecorded {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Insert the patient and append its acknowledgement in one transaction.
fn insert_with_acknowledgement(
    db: &Database,
    patient: StoredPatient,
    body: &AcknowledgementBody,
) -> RegistrationResult<(StoredPatient, AcknowledgementStatus)> {
    let tx = db.transaction()?;
    let patient = PatientStore::insert(db, patient)?;
    let ack = AuditLog::new(db).record(body)?;
    tx.commit().map_err(DbError::from)?;
    Ok((patient, AcknowledgementStatus::Recorded(ack)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientIdentity;
    use crate::store::InMemoryStore;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn maria_form() -> CandidateForm {
        CandidateForm {
            full_name: "Maria da Silva".into(),
            birth_date: Some("1990-05-15".into()),
            mother_name: Some("Ana da Silva".into()),
            cpf: Some("529.982.247-25".into()),
            ..Default::default()
        }
    }

    fn existing_maria() -> StoredPatient {
        StoredPatient::with_id(
            "1",
            PatientIdentity::new("Maria da Silva")
                .with_birth_date(NaiveDate::from_ymd_opt(1990, 5, 15).unwrap())
                .with_mother_name("Ana da Silva"),
        )
    }

    #[test]
    fn test_register_clean_candidate() {
        let store = InMemoryStore::new();
        let registrar = Registrar::new(&store, Validator::default());

        let outcome = registrar.register(&maria_form(), None, now()).unwrap();
        assert!(outcome.patient().is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_blocked_candidate_not_stored() {
        let store = InMemoryStore::new();
        let registrar = Registrar::new(&store, Validator::default());

        let form = CandidateForm {
            cpf: None,
            ..maria_form()
        };
        let outcome = registrar.register(&form, Some("recepcao.ana"), now()).unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Blocked(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicates_need_acknowledgement() {
        let store = InMemoryStore::with_patients(vec![existing_maria()]);
        let registrar = Registrar::new(&store, Validator::default());

        let outcome = registrar.register(&maria_form(), None, now()).unwrap();
        match outcome {
            RegistrationOutcome::NeedsAcknowledgement(result) => {
                assert!(result.can_submit);
                assert_eq!(result.duplicate_ids(), vec!["1"]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_acknowledged_duplicates_are_audited() {
        let db = Database::open_in_memory().unwrap();
        db.insert_patient(&existing_maria()).unwrap();
        let registrar = Registrar::for_database(&db, Validator::default());

        let outcome = registrar
            .register(&maria_form(), Some("recepcao.ana"), now())
            .unwrap();

        let RegistrationOutcome::Registered {
            patient,
            acknowledgement,
            ..
        } = outcome
        else {
            panic!("expected registration");
        };
        let ack = acknowledgement.recorded().expect("acknowledgement recorded");
        assert_eq!(ack.body.matched_patient_ids, vec!["1".to_string()]);
        assert_eq!(ack.body.created_patient_id, Some(patient.id.clone()));
        assert_eq!(db.count_patients().unwrap(), 2);
        assert!(AuditLog::new(&db).verify_chain().unwrap().is_valid());
    }

    #[test]
    fn test_failed_acknowledgement_rolls_back_patient() {
        let db = Database::open_in_memory().unwrap();
        db.insert_patient(&existing_maria()).unwrap();
        db.conn()
            .execute_batch("DROP TABLE duplicate_acknowledgements")
            .unwrap();
        let registrar = Registrar::for_database(&db, Validator::default());

        let result = registrar.register(&maria_form(), Some("recepcao.ana"), now());
        assert!(matches!(result, Err(RegistrationError::Audit(_))));
        // Nothing half-written: a retry starts from the same state
        assert_eq!(db.count_patients().unwrap(), 1);
    }

    #[test]
    fn test_separate_audit_failure_still_registers() {
        let store = InMemoryStore::with_patients(vec![existing_maria()]);
        let audit_db = Database::open_in_memory().unwrap();
        audit_db
            .conn()
            .execute_batch("DROP TABLE duplicate_acknowledgements")
            .unwrap();
        let registrar =
            Registrar::new(&store, Validator::default()).with_audit_log(AuditLog::new(&audit_db));

        let outcome = registrar
            .register(&maria_form(), Some("recepcao.ana"), now())
            .unwrap();
        match outcome {
            RegistrationOutcome::Registered {
                acknowledgement: AcknowledgementStatus::Unrecorded { reason },
                ..
            } => assert!(!reason.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_acknowledgement_without_audit_log_is_unrecorded() {
        let store = InMemoryStore::with_patients(vec![existing_maria()]);
        let registrar = Registrar::new(&store, Validator::default());

        let outcome = registrar
            .register(&maria_form(), Some("recepcao.ana"), now())
            .unwrap();
        assert!(matches!(
            outcome,
            RegistrationOutcome::Registered {
                acknowledgement: AcknowledgementStatus::Unrecorded { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_form_is_error() {
        let store = InMemoryStore::new();
        let registrar = Registrar::new(&store, Validator::default());
        let form = CandidateForm {
            birth_date: Some("31/02/2020".into()),
            ..maria_form()
        };
        assert!(matches!(
            registrar.register(&form, None, now()),
            Err(RegistrationError::Validation(ValidationError::InvalidDate { .. }))
        ));
    }
}
