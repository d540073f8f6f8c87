//! Patient identity validation.
//!
//! Pipeline: Form parsing → Document policy → Duplicate matcher → Alerts
//!
//! Only the document policy can block submission. Possible duplicates
//! produce advisory alerts that a person has to look at.

mod age;
mod form;
mod matcher;
mod newborn;
mod policy;

pub use age::*;
pub use form::*;
pub use matcher::*;
pub use newborn::*;
pub use policy::*;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ValidationConfig;
use crate::documents::DocumentError;
use crate::models::{
    Alert, AlertKind, OrchestrationResult, PatientIdentity, PolicyResult, Severity, StoredPatient,
};

/// Input errors raised at the form boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date in {field}: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid {field}: {source}")]
    Document {
        field: &'static str,
        #[source]
        source: DocumentError,
    },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Orchestrates the policy and matcher checks for a candidate.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: DocumentPolicy,
    tracker: UpdateWindowTracker,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            policy: DocumentPolicy::from_config(config),
            tracker: UpdateWindowTracker::from_config(config),
        }
    }

    pub fn policy(&self) -> &DocumentPolicy {
        &self.policy
    }

    pub fn tracker(&self) -> &UpdateWindowTracker {
        &self.tracker
    }

    /// Evaluate the document policy for a candidate.
    pub fn evaluate_policy(&self, candidate: &PatientIdentity, now: NaiveDate) -> PolicyResult {
        match candidate.birth_date {
            Some(birth_date) => self.policy.evaluate(
                birth_date,
                candidate.cpf.as_ref(),
                candidate.justification(),
                now,
            ),
            None => self.policy.evaluate_without_birth_date(candidate.cpf.as_ref()),
        }
    }

    /// Run the document policy, then the duplicate matcher.
    ///
    /// Deterministic: identical inputs give identical results.
    pub fn validate_and_prepare_patient(
        &self,
        candidate: &PatientIdentity,
        store: &[StoredPatient],
        now: NaiveDate,
    ) -> OrchestrationResult {
        let mut alerts = Vec::new();

        // Step 1: Document policy (may block)
        let policy = self.evaluate_policy(candidate, now);
        let can_submit = !policy.is_blocked();
        if let Some(alert) = policy_alert(&policy, self.policy.cpf_required_from_months) {
            alerts.push(alert);
        }

        // Step 2: Duplicate matcher (advisory only)
        let duplicates = find_possible_duplicates(candidate, store);
        alerts.extend(duplicates.iter().map(|stored| duplicate_alert(stored)));

        if !can_submit {
            info!(?policy, "registration blocked by document policy");
        }
        debug!(
            duplicates = duplicates.len(),
            store_size = store.len(),
            "candidate validated"
        );

        OrchestrationResult { can_submit, alerts }
    }
}

/// Validate with default settings.
pub fn validate_and_prepare_patient(
    candidate: &PatientIdentity,
    store: &[StoredPatient],
    now: NaiveDate,
) -> OrchestrationResult {
    Validator::default().validate_and_prepare_patient(candidate, store, now)
}

fn policy_alert(policy: &PolicyResult, cpf_required_from_months: u32) -> Option<Alert> {
    match policy {
        PolicyResult::Allowed => None,
        PolicyResult::RequiresJustification { .. } => Some(Alert {
            kind: AlertKind::JustificationRecorded,
            severity: Severity::Info,
            message: "CPF não informado: a justificativa será registrada no cadastro".into(),
            patient_id: None,
        }),
        PolicyResult::Blocked { reason } => {
            let message = if reason == REASON_JUSTIFICATION_REQUIRED {
                format!(
                    "Informe o CPF ou a justificativa da ausência de CPF para menores de {} meses",
                    cpf_required_from_months
                )
            } else {
                format!(
                    "CPF obrigatório para pacientes a partir de {} meses",
                    cpf_required_from_months
                )
            };
            Some(Alert {
                kind: AlertKind::PolicyBlocked,
                severity: Severity::Blocking,
                message,
                patient_id: None,
            })
        }
    }
}

fn duplicate_alert(stored: &StoredPatient) -> Alert {
    let identity = &stored.identity;
    let mut details = Vec::new();
    if let Some(birth_date) = identity.birth_date {
        details.push(format!("nascimento {}", birth_date.format("%d/%m/%Y")));
    }
    if let Some(mother) = identity.mother_name.as_deref() {
        details.push(format!("mãe {}", mother.trim()));
    }

    let message = if details.is_empty() {
        format!("Possível paciente duplicado: {}", identity.full_name.trim())
    } else {
        format!(
            "Possível paciente duplicado: {} ({})",
            identity.full_name.trim(),
            details.join(", ")
        )
    };

    Alert {
        kind: AlertKind::PossibleDuplicate,
        severity: Severity::Warning,
        message,
        patient_id: Some(stored.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Cpf;
    use chrono::Duration;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn cpf() -> Cpf {
        Cpf::parse("111.444.777-35").unwrap()
    }

    #[test]
    fn test_blocked_policy_disables_submit() {
        let candidate =
            PatientIdentity::new("Bebê Souza").with_birth_date(now() - Duration::days(90));
        let result = validate_and_prepare_patient(&candidate, &[], now());

        assert!(!result.can_submit);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].kind, AlertKind::PolicyBlocked);
        assert!(result.alerts[0].is_blocking());
    }

    #[test]
    fn test_justification_is_informational() {
        let candidate = PatientIdentity::new("Bebê Souza")
            .with_birth_date(now() - Duration::days(30))
            .with_justification("aguardando registro civil");
        let result = validate_and_prepare_patient(&candidate, &[], now());

        assert!(result.can_submit);
        assert_eq!(result.alerts[0].kind, AlertKind::JustificationRecorded);
        assert_eq!(result.alerts[0].severity, Severity::Info);
    }

    #[test]
    fn test_duplicates_do_not_block() {
        let identity = PatientIdentity::new("Maria da Silva")
            .with_birth_date(NaiveDate::from_ymd_opt(1990, 5, 15).unwrap())
            .with_mother_name("Ana da Silva");
        let store = vec![StoredPatient::with_id("1", identity.clone())];

        let result = validate_and_prepare_patient(&identity.with_cpf(cpf()), &store, now());
        assert!(result.can_submit);
        assert_eq!(result.duplicate_ids(), vec!["1"]);
        assert_eq!(
            result.alerts[0].message,
            "Possível paciente duplicado: Maria da Silva (nascimento 15/05/1990, mãe Ana da Silva)"
        );
    }

    #[test]
    fn test_blocked_and_duplicates_together() {
        let identity = PatientIdentity::new("Maria da Silva")
            .with_birth_date(NaiveDate::from_ymd_opt(1990, 5, 15).unwrap());
        let store = vec![StoredPatient::with_id("7", identity.clone())];

        let result = validate_and_prepare_patient(&identity, &store, now());
        assert!(!result.can_submit);
        assert_eq!(result.alerts.len(), 2);
        assert_eq!(result.alerts[0].kind, AlertKind::PolicyBlocked);
        assert_eq!(result.alerts[1].kind, AlertKind::PossibleDuplicate);
    }

    #[test]
    fn test_missing_birth_date_requires_cpf() {
        let candidate = PatientIdentity::new("Sem Data");
        let result = validate_and_prepare_patient(&candidate, &[], now());
        assert!(!result.can_submit);

        let result = validate_and_prepare_patient(&candidate.with_cpf(cpf()), &[], now());
        assert!(result.can_submit);
        assert!(result.alerts.is_empty());
    }
}
