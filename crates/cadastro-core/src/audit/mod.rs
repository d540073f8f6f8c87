//! Hash-chained log of duplicate acknowledgements.
//!
//! Whenever a user registers a patient despite possible-duplicate
//! warnings, who did it and which records were shown is appended here.
//! Each entry commits to the previous one:
//!
//! ```text
//! entry_hash = SHA-256(prev_hash || canonical_json(body))
//! ```
//!
//! so editing or removing a past entry breaks every later link.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{AcknowledgementRow, Database};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audit log errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid acknowledgement: {0}")]
    Invalid(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// What was acknowledged, by whom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcknowledgementBody {
    pub ack_id: String,
    pub candidate_name: String,
    pub candidate_birth_date: Option<NaiveDate>,
    /// Stored patients shown as possible duplicates
    pub matched_patient_ids: Vec<String>,
    /// Patient created after the acknowledgement
    pub created_patient_id: Option<String>,
    pub acknowledged_by: String,
    /// RFC 3339 timestamp
    pub acknowledged_at: String,
}

impl AcknowledgementBody {
    pub fn new(
        candidate_name: impl Into<String>,
        candidate_birth_date: Option<NaiveDate>,
        matched_patient_ids: Vec<String>,
        acknowledged_by: impl Into<String>,
    ) -> Self {
        Self {
            ack_id: uuid::Uuid::new_v4().to_string(),
            candidate_name: candidate_name.into(),
            candidate_birth_date,
            matched_patient_ids,
            created_patient_id: None,
            acknowledged_by: acknowledged_by.into(),
            acknowledged_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Serialize with struct field order, which is fixed.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A committed log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub seq: i64,
    pub body: AcknowledgementBody,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// Result of walking the whole chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub entries: usize,
    /// Sequence number of the first entry whose link does not verify
    pub first_broken: Option<i64>,
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Hash an entry payload onto the previous hash.
pub fn hash_entry(prev_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append-only acknowledgement log backed by the database.
pub struct AuditLog<'a> {
    db: &'a Database,
}

impl<'a> AuditLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an acknowledgement.
    pub fn record(&self, body: &AcknowledgementBody) -> AuditResult<Acknowledgement> {
        if body.acknowledged_by.trim().is_empty() {
            return Err(AuditError::Invalid("acknowledged_by is required".into()));
        }
        if body.matched_patient_ids.is_empty() {
            return Err(AuditError::Invalid(
                "an acknowledgement must reference at least one matched patient".into(),
            ));
        }

        let payload = body.to_canonical_json()?;
        let prev_hash = self
            .db
            .last_acknowledgement_hash()?
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let entry_hash = hash_entry(&prev_hash, &payload);

        let seq = self
            .db
            .insert_acknowledgement(&body.ack_id, &payload, &prev_hash, &entry_hash)?;

        info!(
            ack_id = %body.ack_id,
            acknowledged_by = %body.acknowledged_by,
            matches = body.matched_patient_ids.len(),
            "duplicate warning acknowledged"
        );

        Ok(Acknowledgement {
            seq,
            body: body.clone(),
            prev_hash,
            entry_hash,
        })
    }

    /// All entries in append order.
    pub fn entries(&self) -> AuditResult<Vec<Acknowledgement>> {
        self.db
            .list_acknowledgements()?
            .into_iter()
            .map(|row| {
                Ok(Acknowledgement {
                    seq: row.seq,
                    body: serde_json::from_str(&row.payload)?,
                    prev_hash: row.prev_hash,
                    entry_hash: row.entry_hash,
                })
            })
            .collect()
    }

    /// Recompute every hash and check each link.
    pub fn verify_chain(&self) -> AuditResult<ChainVerification> {
        let rows = self.db.list_acknowledgements()?;
        let first_broken = first_broken_link(&rows);
        if let Some(seq) = first_broken {
            warn!(seq, "acknowledgement chain broken");
        }

        Ok(ChainVerification {
            entries: rows.len(),
            first_broken,
        })
    }
}

fn first_broken_link(rows: &[AcknowledgementRow]) -> Option<i64> {
    let mut expected_prev = GENESIS_HASH.to_string();
    for row in rows {
        if row.prev_hash != expected_prev || hash_entry(&row.prev_hash, &row.payload) != row.entry_hash
        {
            return Some(row.seq);
        }
        expected_prev = row.entry_hash.clone();
    }
    None
}
