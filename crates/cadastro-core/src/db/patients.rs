//! Patient database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::documents::{Cns, Cpf};
use crate::models::{PatientIdentity, StoredPatient};
use crate::store::{rank_by_name, SearchField};
use crate::validation::normalize_name;

/// Rows fetched per name search before ranking.
const NAME_CANDIDATE_LIMIT: usize = 200;

const PATIENT_COLUMNS: &str = r#"
    id, full_name, birth_date, mother_name, mother_cpf, cpf, cns,
    cpf_absence_justification, created_at, updated_at
"#;

/// Raw patient row; documents and dates are re-validated on the way out.
struct PatientRow {
    id: String,
    full_name: String,
    birth_date: Option<String>,
    mother_name: Option<String>,
    mother_cpf: Option<String>,
    cpf: Option<String>,
    cns: Option<String>,
    cpf_absence_justification: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            full_name: row.get(1)?,
            birth_date: row.get(2)?,
            mother_name: row.get(3)?,
            mother_cpf: row.get(4)?,
            cpf: row.get(5)?,
            cns: row.get(6)?,
            cpf_absence_justification: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_patient(self) -> DbResult<StoredPatient> {
        let id = self.id;
        let corrupt = |reason: String| DbError::Corrupt {
            id: id.clone(),
            reason,
        };

        let birth_date = self
            .birth_date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| corrupt(format!("birth_date: {}", e)))?;
        let mother_cpf = self
            .mother_cpf
            .map(|c| Cpf::parse(&c))
            .transpose()
            .map_err(|e| corrupt(format!("mother_cpf: {}", e)))?;
        let cpf = self
            .cpf
            .map(|c| Cpf::parse(&c))
            .transpose()
            .map_err(|e| corrupt(format!("cpf: {}", e)))?;
        let cns = self
            .cns
            .map(|c| Cns::parse(&c))
            .transpose()
            .map_err(|e| corrupt(format!("cns: {}", e)))?;

        Ok(StoredPatient {
            identity: PatientIdentity {
                full_name: self.full_name,
                birth_date,
                mother_name: self.mother_name,
                mother_cpf,
                cpf,
                cns,
                cpf_absence_justification: self.cpf_absence_justification,
            },
            id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Escape LIKE wildcards in user input (used with `ESCAPE '\'`).
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &StoredPatient) -> DbResult<()> {
        let identity = &patient.identity;
        let result = self.conn.execute(
            r#"
            INSERT INTO patients (
                id, full_name, name_normalized, birth_date, mother_name, mother_cpf,
                cpf, cns, cpf_absence_justification, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                patient.id,
                identity.full_name,
                normalize_name(&identity.full_name),
                identity.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                identity.mother_name,
                identity.mother_cpf.as_ref().map(Cpf::digits),
                identity.cpf.as_ref().map(Cpf::digits),
                identity.cns.as_ref().map(Cns::digits),
                identity.cpf_absence_justification,
                patient.created_at,
                patient.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Constraint(
                    msg.unwrap_or_else(|| format!("patient {} already exists", patient.id)),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<StoredPatient>> {
        let sql = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id], PatientRow::from_row)
            .optional()?;
        row.map(PatientRow::into_patient).transpose()
    }

    /// Search patients by name substring, best matches first.
    ///
    /// `normalized_query` must already be trimmed and lowercase.
    pub fn search_patients_by_name(
        &self,
        normalized_query: &str,
        limit: usize,
    ) -> DbResult<Vec<StoredPatient>> {
        let escaped = escape_like(normalized_query);
        let pattern = format!("%{}%", escaped);
        let prefix = format!("{}%", escaped);
        // Prefix matches outrank substring matches, so they go into the
        // candidate window first.
        let sql = format!(
            r#"
            SELECT {} FROM patients
            WHERE name_normalized LIKE ?1 ESCAPE '\'
            ORDER BY (name_normalized LIKE ?3 ESCAPE '\') DESC, name_normalized
            LIMIT ?2
            "#,
            PATIENT_COLUMNS
        );

        let patients = self.query_patients(
            &sql,
            params![pattern, NAME_CANDIDATE_LIMIT.max(limit) as i64, prefix],
        )?;
        let mut ranked = rank_by_name(normalized_query, patients);
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Search patients by CPF or CNS digit prefix.
    pub fn search_patients_by_document(
        &self,
        field: SearchField,
        digits: &str,
        limit: usize,
    ) -> DbResult<Vec<StoredPatient>> {
        let column = match field {
            SearchField::Cpf => "cpf",
            SearchField::Cns => "cns",
            SearchField::Name => {
                return self.search_patients_by_name(&normalize_name(digits), limit)
            }
        };

        let sql = format!(
            r#"
            SELECT {} FROM patients
            WHERE {} LIKE ?1
            ORDER BY {}, rowid
            LIMIT ?2
            "#,
            PATIENT_COLUMNS, column, column
        );
        let pattern = format!("{}%", escape_like(digits));
        self.query_patients(&sql, params![pattern, limit as i64])
    }

    /// List all patients in insertion order.
    pub fn list_patients(&self) -> DbResult<Vec<StoredPatient>> {
        let sql = format!("SELECT {} FROM patients ORDER BY rowid", PATIENT_COLUMNS);
        self.query_patients(&sql, params![])
    }

    /// Count stored patients.
    pub fn count_patients(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_patients<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> DbResult<Vec<StoredPatient>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, PatientRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PatientRow::into_patient).collect()
    }
}
