//! Patient identity models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::documents::{Cns, Cpf};

/// Identity fields of a patient, either a registration candidate or a
/// stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    /// Full name as typed (compared trimmed and case-folded)
    pub full_name: String,
    /// Date of birth; missing on some legacy records
    pub birth_date: Option<NaiveDate>,
    /// Mother's full name
    pub mother_name: Option<String>,
    /// Mother's CPF
    pub mother_cpf: Option<Cpf>,
    /// Patient CPF (subject to the age-based document policy)
    pub cpf: Option<Cpf>,
    /// National health card number
    pub cns: Option<Cns>,
    /// Why the CPF is absent (newborns only)
    pub cpf_absence_justification: Option<String>,
}

impl PatientIdentity {
    /// Create an identity with only a name.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            birth_date: None,
            mother_name: None,
            mother_cpf: None,
            cpf: None,
            cns: None,
            cpf_absence_justification: None,
        }
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_mother_name(mut self, mother_name: impl Into<String>) -> Self {
        self.mother_name = Some(mother_name.into());
        self
    }

    pub fn with_cpf(mut self, cpf: Cpf) -> Self {
        self.cpf = Some(cpf);
        self
    }

    pub fn with_cns(mut self, cns: Cns) -> Self {
        self.cns = Some(cns);
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.cpf_absence_justification = Some(justification.into());
        self
    }

    /// Justification text if it is non-blank.
    pub fn justification(&self) -> Option<&str> {
        self.cpf_absence_justification
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
    }
}

/// A patient record owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPatient {
    /// Store-assigned identifier
    pub id: String,
    #[serde(flatten)]
    pub identity: PatientIdentity,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl StoredPatient {
    /// Wrap an identity with a freshly generated id.
    pub fn new(identity: PatientIdentity) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Wrap an identity under a known id (imports, fixtures).
    pub fn with_id(id: impl Into<String>, identity: PatientIdentity) -> Self {
        let mut patient = Self::new(identity);
        patient.id = id.into();
        patient
    }
}
