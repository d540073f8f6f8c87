//! Patient payloads returned by a remote registry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cadastro_core::documents::{DocumentError, DocumentResult};
use cadastro_core::store::StoreError;
use cadastro_core::{Cns, Cpf, PatientIdentity, StoredPatient};

/// Search errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Invalid date for patient {id}: {value}")]
    InvalidDate { id: String, value: String },

    #[error("Invalid {field} for patient {id}: {source}")]
    InvalidDocument {
        id: String,
        field: &'static str,
        #[source]
        source: DocumentError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type SearchResult<T> = Result<T, SearchError>;

/// A patient record as the remote registry sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePatient {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub mother_cpf: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub cns: Option<String>,
    #[serde(default)]
    pub cpf_absence_justification: Option<String>,
}

impl RemotePatient {
    /// Validate the record into a [`StoredPatient`].
    pub fn into_patient(self) -> SearchResult<StoredPatient> {
        let birth_date = match non_blank(&self.birth_date) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                SearchError::InvalidDate {
                    id: self.id.clone(),
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };

        let identity = PatientIdentity {
            full_name: self.full_name.trim().to_string(),
            birth_date,
            mother_name: non_blank(&self.mother_name).map(str::to_string),
            mother_cpf: document(&self.id, "motherCpf", &self.mother_cpf, Cpf::parse)?,
            cpf: document(&self.id, "cpf", &self.cpf, Cpf::parse)?,
            cns: document(&self.id, "cns", &self.cns, Cns::parse)?,
            cpf_absence_justification: non_blank(&self.cpf_absence_justification)
                .map(str::to_string),
        };

        Ok(StoredPatient::with_id(self.id, identity))
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn document<T>(
    id: &str,
    field: &'static str,
    raw: &Option<String>,
    parse: fn(&str) -> DocumentResult<T>,
) -> SearchResult<Option<T>> {
    non_blank(raw)
        .map(|value| {
            parse(value).map_err(|source| SearchError::InvalidDocument {
                id: id.to_string(),
                field,
                source,
            })
        })
        .transpose()
}

/// Parse a search response body into patients, keeping server order.
///
/// The body must contain a JSON array; text around it (proxies that wrap
/// or prefix responses) is ignored.
pub fn parse_search_response(body: &str) -> SearchResult<Vec<StoredPatient>> {
    let start = body
        .find('[')
        .ok_or_else(|| SearchError::InvalidFormat("No JSON array found in response".into()))?;
    let end = body
        .rfind(']')
        .ok_or_else(|| SearchError::InvalidFormat("No closing bracket found in response".into()))?;
    if end < start {
        return Err(SearchError::InvalidFormat("Unbalanced JSON array".into()));
    }

    let records: Vec<RemotePatient> = serde_json::from_str(&body[start..=end])?;
    records.into_iter().map(RemotePatient::into_patient).collect()
}
