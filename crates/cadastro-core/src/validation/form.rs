//! Raw registration form input and its conversion to a typed identity.
//!
//! This is the boundary where malformed input is rejected; everything
//! past it works on well-typed values and cannot fail.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::documents::{Cns, Cpf};
use crate::models::PatientIdentity;

use super::{ValidationError, ValidationResult};

/// Accepted birth date layouts: ISO and the Brazilian day-first form.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Registration form fields exactly as typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateForm {
    pub full_name: String,
    pub birth_date: Option<String>,
    pub mother_name: Option<String>,
    pub mother_cpf: Option<String>,
    pub cpf: Option<String>,
    pub cns: Option<String>,
    pub cpf_absence_justification: Option<String>,
}

impl CandidateForm {
    /// Validate field formats and build a [`PatientIdentity`].
    ///
    /// Blank optional fields become `None`. Birth dates after `now` are
    /// rejected.
    pub fn parse(&self, now: NaiveDate) -> ValidationResult<PatientIdentity> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err(ValidationError::InvalidInput("full name is required".into()));
        }

        let birth_date = non_blank(&self.birth_date)
            .map(|raw| parse_date("birthDate", raw))
            .transpose()?;
        if let Some(birth_date) = birth_date {
            if birth_date > now {
                return Err(ValidationError::InvalidInput(format!(
                    "birth date {} is in the future",
                    birth_date
                )));
            }
        }

        Ok(PatientIdentity {
            full_name: full_name.to_string(),
            birth_date,
            mother_name: non_blank(&self.mother_name).map(str::to_string),
            mother_cpf: parse_document("motherCpf", &self.mother_cpf, Cpf::parse)?,
            cpf: parse_document("cpf", &self.cpf, Cpf::parse)?,
            cns: parse_document("cns", &self.cns, Cns::parse)?,
            cpf_absence_justification: non_blank(&self.cpf_absence_justification)
                .map(str::to_string),
        })
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse an ISO (`1990-05-15`) or day-first (`15/05/1990`) calendar date.
pub fn parse_date(field: &'static str, raw: &str) -> ValidationResult<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ValidationError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

fn parse_document<T>(
    field: &'static str,
    raw: &Option<String>,
    parse: fn(&str) -> crate::documents::DocumentResult<T>,
) -> ValidationResult<Option<T>> {
    non_blank(raw)
        .map(|value| parse(value).map_err(|source| ValidationError::Document { field, source }))
        .transpose()
}
