//! SQLite schema definition.

/// Complete database schema for the patient registry.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    name_normalized TEXT NOT NULL,               -- trimmed, lowercase; used for search
    birth_date TEXT,                             -- ISO date, NULL on legacy records
    mother_name TEXT,
    mother_cpf TEXT,                             -- 11 bare digits
    cpf TEXT,                                    -- 11 bare digits
    cns TEXT,                                    -- 15 bare digits
    cpf_absence_justification TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name_normalized);
CREATE INDEX IF NOT EXISTS idx_patients_cpf ON patients(cpf);
CREATE INDEX IF NOT EXISTS idx_patients_cns ON patients(cns);

-- ============================================================================
-- Duplicate Acknowledgements (Append-Only, hash-chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS duplicate_acknowledgements (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    ack_id TEXT NOT NULL UNIQUE,
    payload TEXT NOT NULL,                       -- canonical JSON of the acknowledgement body
    prev_hash TEXT NOT NULL,                     -- entry_hash of the previous row, or genesis
    entry_hash TEXT NOT NULL UNIQUE,             -- SHA-256(prev_hash || payload)
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Acknowledgements are never edited or removed
CREATE TRIGGER IF NOT EXISTS duplicate_acknowledgements_no_update
BEFORE UPDATE ON duplicate_acknowledgements
BEGIN
    SELECT RAISE(ABORT, 'Acknowledgements are append-only');
END;

CREATE TRIGGER IF NOT EXISTS duplicate_acknowledgements_no_delete
BEFORE DELETE ON duplicate_acknowledgements
BEGIN
    SELECT RAISE(ABORT, 'Acknowledgements are append-only');
END;
"#;
