//! Duplicate acknowledgement log operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// A raw acknowledgement log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgementRow {
    pub seq: i64,
    pub ack_id: String,
    pub payload: String,
    pub prev_hash: String,
    pub entry_hash: String,
    pub created_at: String,
}

impl Database {
    /// Append an acknowledgement entry.
    pub fn insert_acknowledgement(
        &self,
        ack_id: &str,
        payload: &str,
        prev_hash: &str,
        entry_hash: &str,
    ) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO duplicate_acknowledgements (ack_id, payload, prev_hash, entry_hash)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![ack_id, payload, prev_hash, entry_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Hash of the most recent entry, if any.
    pub fn last_acknowledgement_hash(&self) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT entry_hash FROM duplicate_acknowledgements ORDER BY seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// All entries in append order.
    pub fn list_acknowledgements(&self) -> DbResult<Vec<AcknowledgementRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, ack_id, payload, prev_hash, entry_hash, created_at
            FROM duplicate_acknowledgements
            ORDER BY seq
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AcknowledgementRow {
                    seq: row.get(0)?,
                    ack_id: row.get(1)?,
                    payload: row.get(2)?,
                    prev_hash: row.get(3)?,
                    entry_hash: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
