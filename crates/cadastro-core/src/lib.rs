//! Cadastro Core Library
//!
//! Identity validation for patient registration in municipal SUS
//! services: duplicate-patient detection and the age-based CPF policy.
//!
//! # Architecture
//!
//! ```text
//! Registration form
//!        │
//!  CandidateForm::parse ──── InvalidInput / InvalidDate
//!        │
//!  ┌─────▼──────────────────────────────┐
//!  │        Validation Orchestrator      │
//!  │  1. Document policy   (may block)   │
//!  │  2. Duplicate matcher (advisory)    │
//!  └─────┬──────────────────────────────┘
//!        │ alerts
//!        ▼
//!  User reviews ──► acknowledgement (hash-chained audit log)
//!        │
//!        ▼
//!  PatientStore::create
//! ```
//!
//! # Core Principle
//!
//! **Possible duplicates are never merged or blocked automatically.** A
//! person always decides.
//!
//! # Modules
//!
//! - [`documents`]: CPF and CNS parsing
//! - [`models`]: Domain types (PatientIdentity, PolicyResult, Alert, ...)
//! - [`validation`]: Matcher, document policy, newborn window, orchestrator
//! - [`store`]: Patient store interface and in-memory implementation
//! - [`db`]: SQLite persistence
//! - [`audit`]: Duplicate acknowledgement log
//! - [`registration`]: End-to-end registration flow
//! - [`config`]: Validation settings

pub mod audit;
pub mod config;
pub mod db;
pub mod documents;
pub mod models;
pub mod registration;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::{AgeMonthRule, ValidationConfig};
pub use db::Database;
pub use documents::{Cns, Cpf};
pub use models::{
    Alert, AlertKind, OrchestrationResult, PatientIdentity, PolicyResult, Severity, StoredPatient,
    UpdateWindow,
};
pub use registration::{AcknowledgementStatus, Registrar, RegistrationOutcome};
pub use store::{InMemoryStore, PatientStore, SearchField, SearchQuery};
pub use validation::{
    compute_update_window, evaluate_document_policy, find_possible_duplicates,
    validate_and_prepare_patient, CandidateForm, Validator,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CadastroError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl From<db::DbError> for CadastroError {
    fn from(e: db::DbError) -> Self {
        CadastroError::DatabaseError(e.to_string())
    }
}

impl From<store::StoreError> for CadastroError {
    fn from(e: store::StoreError) -> Self {
        CadastroError::DatabaseError(e.to_string())
    }
}

impl From<validation::ValidationError> for CadastroError {
    fn from(e: validation::ValidationError) -> Self {
        CadastroError::InvalidInput(e.to_string())
    }
}

impl From<documents::DocumentError> for CadastroError {
    fn from(e: documents::DocumentError) -> Self {
        CadastroError::InvalidInput(e.to_string())
    }
}

impl From<audit::AuditError> for CadastroError {
    fn from(e: audit::AuditError) -> Self {
        CadastroError::AuditError(e.to_string())
    }
}

impl From<registration::RegistrationError> for CadastroError {
    fn from(e: registration::RegistrationError) -> Self {
        match e {
            registration::RegistrationError::Validation(e) => e.into(),
            registration::RegistrationError::Store(e) => e.into(),
            registration::RegistrationError::Audit(e) => e.into(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for CadastroError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        CadastroError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path, with optional settings file.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_path: Option<String>,
) -> Result<Arc<CadastroCore>, CadastroError> {
    let config = ValidationConfig::load(config_path.as_deref().map(Path::new))
        .map_err(|e| CadastroError::ConfigError(format!("{:#}", e)))?;
    let db = Database::open(&path)?;
    Ok(Arc::new(CadastroCore::new(db, config)))
}

/// Create an in-memory database with default settings (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<CadastroCore>, CadastroError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(CadastroCore::new(db, ValidationConfig::default())))
}

/// Validate a CPF and return it with the display mask.
#[uniffi::export]
pub fn format_cpf(raw: String) -> Result<String, CadastroError> {
    Ok(Cpf::parse(&raw)?.formatted())
}

/// Validate a CNS and return it with the display mask.
#[uniffi::export]
pub fn format_cns(raw: String) -> Result<String, CadastroError> {
    Ok(Cns::parse(&raw)?.formatted())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe registry wrapper for FFI.
#[derive(uniffi::Object)]
pub struct CadastroCore {
    db: Arc<Mutex<Database>>,
    validator: Validator,
}

impl CadastroCore {
    fn new(db: Database, config: ValidationConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            validator: Validator::new(&config),
        }
    }
}

/// Resolve the reference date: an explicit ISO/BR date or today's local date.
fn reference_date(today: Option<String>) -> Result<NaiveDate, CadastroError> {
    match today {
        Some(raw) => Ok(validation::parse_date("today", &raw)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

#[uniffi::export]
impl CadastroCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<FfiPatient, CadastroError> {
        let db = self.db.lock()?;
        db.get_patient(&id)?
            .map(Into::into)
            .ok_or(CadastroError::NotFound(id))
    }

    /// Search patients by name, CNS or CPF.
    pub fn search_patients(
        &self,
        query: String,
        field: FfiSearchField,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, CadastroError> {
        let db = self.db.lock()?;
        let query = SearchQuery::new(&query, field.into()).with_limit(limit as usize);
        let patients = db.search(&query)?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Validation Operations
    // =========================================================================

    /// Validate a registration form against the current registry.
    pub fn validate_candidate(
        &self,
        form: FfiCandidateForm,
        today: Option<String>,
    ) -> Result<FfiOrchestrationResult, CadastroError> {
        let now = reference_date(today)?;
        let db = self.db.lock()?;
        let registrar = Registrar::new(&*db, self.validator.clone());
        let result = registrar.check(&form.into(), now)?;
        Ok(result.into())
    }

    /// Register a patient; `acknowledged_by` confirms duplicate warnings.
    pub fn register_patient(
        &self,
        form: FfiCandidateForm,
        acknowledged_by: Option<String>,
        today: Option<String>,
    ) -> Result<FfiRegistrationOutcome, CadastroError> {
        let now = reference_date(today)?;
        let db = self.db.lock()?;
        let registrar = Registrar::for_database(&*db, self.validator.clone());
        let outcome = registrar.register(&form.into(), acknowledged_by.as_deref(), now)?;
        Ok(outcome.into())
    }

    /// Newborn update-window state for a birth date.
    pub fn update_window(
        &self,
        birth_date: String,
        today: Option<String>,
    ) -> Result<FfiUpdateWindow, CadastroError> {
        let now = reference_date(today)?;
        let birth_date = validation::parse_date("birthDate", &birth_date)?;
        Ok(self.validator.tracker().compute(birth_date, now).into())
    }

    /// Human-readable age, e.g. "2 anos e 3 meses".
    pub fn describe_age(
        &self,
        birth_date: String,
        today: Option<String>,
    ) -> Result<String, CadastroError> {
        let now = reference_date(today)?;
        let birth_date = validation::parse_date("birthDate", &birth_date)?;
        Ok(validation::AgeBreakdown::between(birth_date, now).describe())
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Verify the duplicate acknowledgement chain.
    pub fn verify_acknowledgements(&self) -> Result<FfiChainVerification, CadastroError> {
        let db = self.db.lock()?;
        let verification = audit::AuditLog::new(&db).verify_chain()?;
        Ok(verification.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe search field.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiSearchField {
    Name,
    Cns,
    Cpf,
}

impl From<FfiSearchField> for SearchField {
    fn from(field: FfiSearchField) -> Self {
        match field {
            FfiSearchField::Name => SearchField::Name,
            FfiSearchField::Cns => SearchField::Cns,
            FfiSearchField::Cpf => SearchField::Cpf,
        }
    }
}

/// FFI-safe registration form (fields as typed).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCandidateForm {
    pub full_name: String,
    pub birth_date: Option<String>,
    pub mother_name: Option<String>,
    pub mother_cpf: Option<String>,
    pub cpf: Option<String>,
    pub cns: Option<String>,
    pub cpf_absence_justification: Option<String>,
}

impl From<FfiCandidateForm> for CandidateForm {
    fn from(form: FfiCandidateForm) -> Self {
        CandidateForm {
            full_name: form.full_name,
            birth_date: form.birth_date,
            mother_name: form.mother_name,
            mother_cpf: form.mother_cpf,
            cpf: form.cpf,
            cns: form.cns,
            cpf_absence_justification: form.cpf_absence_justification,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub full_name: String,
    pub birth_date: Option<String>,
    pub mother_name: Option<String>,
    pub mother_cpf: Option<String>,
    pub cpf: Option<String>,
    pub cns: Option<String>,
    pub cpf_absence_justification: Option<String>,
}

impl From<StoredPatient> for FfiPatient {
    fn from(patient: StoredPatient) -> Self {
        let identity = patient.identity;
        Self {
            id: patient.id,
            full_name: identity.full_name,
            birth_date: identity.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            mother_name: identity.mother_name,
            mother_cpf: identity.mother_cpf.map(|c| c.formatted()),
            cpf: identity.cpf.map(|c| c.formatted()),
            cns: identity.cns.map(|c| c.formatted()),
            cpf_absence_justification: identity.cpf_absence_justification,
        }
    }
}

/// FFI-safe alert kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiAlertKind {
    PolicyBlocked,
    JustificationRecorded,
    PossibleDuplicate,
}

impl From<AlertKind> for FfiAlertKind {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::PolicyBlocked => FfiAlertKind::PolicyBlocked,
            AlertKind::JustificationRecorded => FfiAlertKind::JustificationRecorded,
            AlertKind::PossibleDuplicate => FfiAlertKind::PossibleDuplicate,
        }
    }
}

/// FFI-safe alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSeverity {
    Info,
    Warning,
    Blocking,
}

impl From<Severity> for FfiSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => FfiSeverity::Info,
            Severity::Warning => FfiSeverity::Warning,
            Severity::Blocking => FfiSeverity::Blocking,
        }
    }
}

/// FFI-safe alert.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlert {
    pub kind: FfiAlertKind,
    pub severity: FfiSeverity,
    pub blocking: bool,
    pub message: String,
    pub patient_id: Option<String>,
}

impl From<Alert> for FfiAlert {
    fn from(alert: Alert) -> Self {
        Self {
            blocking: alert.is_blocking(),
            kind: alert.kind.into(),
            severity: alert.severity.into(),
            message: alert.message,
            patient_id: alert.patient_id,
        }
    }
}

/// FFI-safe orchestration result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrchestrationResult {
    pub can_submit: bool,
    pub alerts: Vec<FfiAlert>,
}

impl From<OrchestrationResult> for FfiOrchestrationResult {
    fn from(result: OrchestrationResult) -> Self {
        Self {
            can_submit: result.can_submit,
            alerts: result.alerts.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe registration status.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiRegistrationStatus {
    Blocked,
    NeedsAcknowledgement,
    Registered,
}

/// FFI-safe registration outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistrationOutcome {
    pub status: FfiRegistrationStatus,
    pub validation: FfiOrchestrationResult,
    pub patient: Option<FfiPatient>,
    pub acknowledgement_hash: Option<String>,
    /// Set when the patient was stored but the acknowledgement was not logged
    pub acknowledgement_error: Option<String>,
}

impl From<RegistrationOutcome> for FfiRegistrationOutcome {
    fn from(outcome: RegistrationOutcome) -> Self {
        match outcome {
            RegistrationOutcome::Blocked(result) => Self {
                status: FfiRegistrationStatus::Blocked,
                validation: result.into(),
                patient: None,
                acknowledgement_hash: None,
                acknowledgement_error: None,
            },
            RegistrationOutcome::NeedsAcknowledgement(result) => Self {
                status: FfiRegistrationStatus::NeedsAcknowledgement,
                validation: result.into(),
                patient: None,
                acknowledgement_hash: None,
                acknowledgement_error: None,
            },
            RegistrationOutcome::Registered {
                patient,
                result,
                acknowledgement,
            } => {
                let (acknowledgement_hash, acknowledgement_error) = match acknowledgement {
                    AcknowledgementStatus::NotNeeded => (None, None),
                    AcknowledgementStatus::Recorded(ack) => (Some(ack.entry_hash), None),
                    AcknowledgementStatus::Unrecorded { reason } => (None, Some(reason)),
                };
                Self {
                    status: FfiRegistrationStatus::Registered,
                    validation: result.into(),
                    patient: Some(patient.into()),
                    acknowledgement_hash,
                    acknowledgement_error,
                }
            }
        }
    }
}

/// FFI-safe update window.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUpdateWindow {
    pub is_newborn: bool,
    pub days_remaining: i64,
    pub is_expired: bool,
}

impl From<UpdateWindow> for FfiUpdateWindow {
    fn from(window: UpdateWindow) -> Self {
        Self {
            is_newborn: window.is_newborn,
            days_remaining: window.days_remaining,
            is_expired: window.is_expired,
        }
    }
}

/// FFI-safe chain verification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainVerification {
    pub entries: u32,
    pub valid: bool,
    pub first_broken_seq: Option<i64>,
}

impl From<audit::ChainVerification> for FfiChainVerification {
    fn from(v: audit::ChainVerification) -> Self {
        Self {
            entries: v.entries as u32,
            valid: v.is_valid(),
            first_broken_seq: v.first_broken,
        }
    }
}
