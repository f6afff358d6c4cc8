//! SQLite schema definition.

/// Complete database schema for prepscreen.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Screening Type Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS screening_types (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    frequency_count INTEGER NOT NULL,
    frequency_unit TEXT NOT NULL,                 -- days, weeks, months, years
    min_age INTEGER,
    max_age INTEGER,
    gender TEXT,                                  -- male, female, NULL = any
    keywords TEXT NOT NULL DEFAULT '[]',          -- JSON array of Keyword
    trigger_conditions TEXT NOT NULL DEFAULT '[]',-- JSON array of TriggerCondition
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_screening_types_active ON screening_types(active);

-- ============================================================================
-- Patients and Chart Data
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    age INTEGER,                                  -- whole years, NULL = unknown
    gender TEXT,                                  -- male, female, NULL = unknown
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS patient_conditions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    name TEXT NOT NULL,
    code_system TEXT,                             -- snomed, icd10cm, icd9cm, custom
    code TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    diagnosed_date TEXT NOT NULL,                 -- ISO date
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_conditions_patient ON patient_conditions(patient_id);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    doc_type TEXT NOT NULL,
    filename TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    document_date TEXT NOT NULL,                  -- ISO date
    ocr_processed INTEGER NOT NULL DEFAULT 0,
    ocr_confidence REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_documents_patient ON documents(patient_id);
CREATE INDEX IF NOT EXISTS idx_documents_date ON documents(document_date);

-- ============================================================================
-- Screening Recommendations
-- ============================================================================

CREATE TABLE IF NOT EXISTS screenings (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    screening_type_id TEXT NOT NULL REFERENCES screening_types(id),
    status TEXT NOT NULL,                         -- due, due_soon, complete, sent_incomplete
    provenance TEXT NOT NULL DEFAULT 'derived',   -- derived, manual
    last_completed TEXT,                          -- ISO date
    due_date TEXT,                                -- ISO date
    evidence_kind TEXT,                           -- condition, document
    evidence_source_id TEXT,
    confidence REAL,
    fingerprint TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (patient_id, screening_type_id)
);

CREATE INDEX IF NOT EXISTS idx_screenings_patient ON screenings(patient_id);
CREATE INDEX IF NOT EXISTS idx_screenings_status ON screenings(status);

-- Matched documents per screening. Deliberately no foreign key on
-- document_id: documents can be deleted out from under a screening, and
-- reconciliation cleans the dangling links up afterwards.
CREATE TABLE IF NOT EXISTS screening_documents (
    screening_id TEXT NOT NULL REFERENCES screenings(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (screening_id, document_id)
);

CREATE INDEX IF NOT EXISTS idx_screening_documents_doc ON screening_documents(document_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_unique_screening_per_patient_and_type() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO patients (id, name) VALUES ('p1', 'Pat')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO screening_types (id, name, frequency_count, frequency_unit)
             VALUES ('st1', 'Mammogram', 1, 'years')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO screenings (id, patient_id, screening_type_id, status)
             VALUES ('s1', 'p1', 'st1', 'due')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO screenings (id, patient_id, screening_type_id, status)
             VALUES ('s2', 'p1', 'st1', 'due')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_document_links_survive_document_delete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO patients (id, name) VALUES ('p1', 'Pat')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO screening_types (id, name, frequency_count, frequency_unit)
             VALUES ('st1', 'Mammogram', 1, 'years')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO screenings (id, patient_id, screening_type_id, status)
             VALUES ('s1', 'p1', 'st1', 'complete')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (id, patient_id, doc_type, filename, document_date)
             VALUES ('d1', 'p1', 'imaging', 'm.pdf', '2025-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO screening_documents (screening_id, document_id) VALUES ('s1', 'd1')",
            [],
        )
        .unwrap();

        // No FK on document_id: the link row stays behind.
        conn.execute("DELETE FROM documents WHERE id = 'd1'", []).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM screening_documents", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_screening_delete_cascades_links() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO patients (id, name) VALUES ('p1', 'Pat')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO screening_types (id, name, frequency_count, frequency_unit)
             VALUES ('st1', 'Mammogram', 1, 'years')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO screenings (id, patient_id, screening_type_id, status)
             VALUES ('s1', 'p1', 'st1', 'complete')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO screening_documents (screening_id, document_id) VALUES ('s1', 'd1')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM screenings WHERE id = 's1'", []).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM screening_documents", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
