//! Patient chart persistence: demographics, problem list, documents.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension};

use super::{date_from_sql, date_to_sql, Database, DbError, DbResult};
use crate::models::{CodeSystem, Document, Gender, Patient, PatientCondition};

struct PatientRow {
    id: String,
    name: String,
    age: Option<i64>,
    gender: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let gender = row
            .gender
            .as_deref()
            .map(|g| {
                Gender::parse(g)
                    .ok_or_else(|| DbError::Constraint(format!("unknown gender '{}'", g)))
            })
            .transpose()?;
        Ok(Patient {
            id: row.id,
            name: row.name,
            age: row.age.map(|v| v as u32),
            gender,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

struct ConditionRow {
    id: String,
    patient_id: String,
    name: String,
    code_system: Option<String>,
    code: Option<String>,
    active: bool,
    diagnosed_date: String,
    recorded_at: String,
}

impl TryFrom<ConditionRow> for PatientCondition {
    type Error = DbError;

    fn try_from(row: ConditionRow) -> Result<Self, Self::Error> {
        let system = row
            .code_system
            .as_deref()
            .map(|s| {
                CodeSystem::parse(s)
                    .ok_or_else(|| DbError::Constraint(format!("unknown code system '{}'", s)))
            })
            .transpose()?;
        Ok(PatientCondition {
            id: row.id,
            patient_id: row.patient_id,
            name: row.name,
            system,
            code: row.code,
            active: row.active,
            diagnosed_date: date_from_sql(&row.diagnosed_date)?,
            recorded_at: row.recorded_at,
        })
    }
}

struct DocumentRow {
    id: String,
    patient_id: String,
    doc_type: String,
    filename: String,
    content: String,
    document_date: String,
    ocr_processed: bool,
    ocr_confidence: Option<f64>,
    created_at: String,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            patient_id: row.patient_id,
            doc_type: row.doc_type,
            filename: row.filename,
            content: row.content,
            document_date: date_from_sql(&row.document_date)?,
            ocr_processed: row.ocr_processed,
            ocr_confidence: row.ocr_confidence,
            created_at: row.created_at,
        })
    }
}

fn read_patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn read_condition_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConditionRow> {
    Ok(ConditionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        code_system: row.get(3)?,
        code: row.get(4)?,
        active: row.get(5)?,
        diagnosed_date: row.get(6)?,
        recorded_at: row.get(7)?,
    })
}

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doc_type: row.get(2)?,
        filename: row.get(3)?,
        content: row.get(4)?,
        document_date: row.get(5)?,
        ocr_processed: row.get(6)?,
        ocr_confidence: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Database {
    /// Insert or update a patient.
    pub fn upsert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (id, name, age, gender, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                gender = excluded.gender,
                updated_at = datetime('now')
            "#,
            params![
                patient.id,
                patient.name,
                patient.age.map(|v| v as i64),
                patient.gender.map(|g| g.as_str()),
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, age, gender, created_at, updated_at
                 FROM patients WHERE id = ?",
                [id],
                read_patient_row,
            )
            .optional()?;
        row.map(Patient::try_from).transpose()
    }

    /// All patient ids in a stable order, for batch sweeps.
    pub fn list_patient_ids(&self) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM patients ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(Into::into)
    }

    /// Record a problem-list entry.
    pub fn insert_condition(&self, condition: &PatientCondition) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patient_conditions (
                id, patient_id, name, code_system, code, active, diagnosed_date, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                condition.id,
                condition.patient_id,
                condition.name,
                condition.system.map(|s| s.as_str()),
                condition.code,
                condition.active,
                date_to_sql(condition.diagnosed_date),
                condition.recorded_at,
            ],
        )?;
        Ok(())
    }

    /// Problem list for a patient, newest diagnosis first.
    pub fn conditions_for_patient(&self, patient_id: &str) -> DbResult<Vec<PatientCondition>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, patient_id, name, code_system, code, active, diagnosed_date, recorded_at
             FROM patient_conditions
             WHERE patient_id = ?
             ORDER BY diagnosed_date DESC, id",
        )?;
        let rows = stmt.query_map([patient_id], read_condition_row)?;
        rows.map(|r| {
            r.map_err(DbError::from)
                .and_then(PatientCondition::try_from)
        })
        .collect()
    }

    /// Store an ingested document with its extracted text.
    pub fn insert_document(&self, document: &Document) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO documents (
                id, patient_id, doc_type, filename, content,
                document_date, ocr_processed, ocr_confidence, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                document.id,
                document.patient_id,
                document.doc_type,
                document.filename,
                document.content,
                date_to_sql(document.document_date),
                document.ocr_processed,
                document.ocr_confidence,
                document.created_at,
            ],
        )?;
        Ok(())
    }

    /// Delete a document row. Any screening_documents links it leaves
    /// behind are cleaned up by reconciliation, not here.
    pub fn delete_document(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Documents for a patient, newest first.
    pub fn documents_for_patient(&self, patient_id: &str) -> DbResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, patient_id, doc_type, filename, content,
                    document_date, ocr_processed, ocr_confidence, created_at
             FROM documents
             WHERE patient_id = ?
             ORDER BY document_date DESC, id",
        )?;
        let rows = stmt.query_map([patient_id], read_document_row)?;
        rows.map(|r| r.map_err(DbError::from).and_then(Document::try_from))
            .collect()
    }

    /// Ids of all documents currently stored for a patient.
    pub fn document_ids_for_patient(&self, patient_id: &str) -> DbResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM documents WHERE patient_id = ?")?;
        let rows = stmt.query_map([patient_id], |row| row.get(0))?;
        rows.collect::<Result<HashSet<String>, _>>()
            .map_err(Into::into)
    }
}
