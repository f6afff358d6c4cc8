//! Screening row persistence, including the repository implementation
//! that backs reconciliation.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension};

use super::{date_to_sql, opt_date_from_sql, Database, DbError, DbResult};
use crate::models::{EvidenceKind, Provenance, Screening, ScreeningStatus};
use crate::reconcile::{
    ReconcileOutcome, ReconcilePlan, RepoResult, RepositoryError, ScreeningRepository,
};

struct ScreeningRow {
    id: String,
    patient_id: String,
    screening_type_id: String,
    status: String,
    provenance: String,
    last_completed: Option<String>,
    due_date: Option<String>,
    evidence_kind: Option<String>,
    evidence_source_id: Option<String>,
    confidence: Option<f64>,
    fingerprint: String,
    active: bool,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ScreeningRow> for Screening {
    type Error = DbError;

    /// Decodes everything except the matched-document links, which live
    /// in their own table and get filled in by the caller.
    fn try_from(row: ScreeningRow) -> Result<Self, Self::Error> {
        let status = ScreeningStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("unknown status '{}'", row.status)))?;
        let provenance = Provenance::parse(&row.provenance).ok_or_else(|| {
            DbError::Constraint(format!("unknown provenance '{}'", row.provenance))
        })?;
        let evidence_kind = row
            .evidence_kind
            .as_deref()
            .map(|k| {
                EvidenceKind::parse(k)
                    .ok_or_else(|| DbError::Constraint(format!("unknown evidence kind '{}'", k)))
            })
            .transpose()?;

        Ok(Screening {
            id: row.id,
            patient_id: row.patient_id,
            screening_type_id: row.screening_type_id,
            status,
            provenance,
            last_completed: opt_date_from_sql(row.last_completed)?,
            due_date: opt_date_from_sql(row.due_date)?,
            evidence_kind,
            evidence_source_id: row.evidence_source_id,
            confidence: row.confidence,
            matched_document_ids: Vec::new(),
            fingerprint: row.fingerprint,
            active: row.active,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn read_screening_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScreeningRow> {
    Ok(ScreeningRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        screening_type_id: row.get(2)?,
        status: row.get(3)?,
        provenance: row.get(4)?,
        last_completed: row.get(5)?,
        due_date: row.get(6)?,
        evidence_kind: row.get(7)?,
        evidence_source_id: row.get(8)?,
        confidence: row.get(9)?,
        fingerprint: row.get(10)?,
        active: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

const SCREENING_COLUMNS: &str = "id, patient_id, screening_type_id, status, provenance, \
     last_completed, due_date, evidence_kind, evidence_source_id, confidence, \
     fingerprint, active, notes, created_at, updated_at";

// Free helpers that take a raw connection so apply_plan can run them
// inside a rusqlite transaction (which derefs to Connection).

fn insert_screening_tx(conn: &Connection, screening: &Screening) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO screenings (
            id, patient_id, screening_type_id, status, provenance,
            last_completed, due_date, evidence_kind, evidence_source_id,
            confidence, fingerprint, active, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            screening.id,
            screening.patient_id,
            screening.screening_type_id,
            screening.status.as_str(),
            screening.provenance.as_str(),
            screening.last_completed.map(date_to_sql),
            screening.due_date.map(date_to_sql),
            screening.evidence_kind.map(|k| k.as_str()),
            screening.evidence_source_id,
            screening.confidence,
            screening.fingerprint,
            screening.active,
            screening.notes,
            screening.created_at,
            screening.updated_at,
        ],
    )?;
    Ok(())
}

fn update_screening_tx(conn: &Connection, screening: &Screening) -> DbResult<()> {
    let rows_affected = conn.execute(
        r#"
        UPDATE screenings SET
            status = ?2,
            provenance = ?3,
            last_completed = ?4,
            due_date = ?5,
            evidence_kind = ?6,
            evidence_source_id = ?7,
            confidence = ?8,
            fingerprint = ?9,
            active = ?10,
            notes = ?11,
            updated_at = ?12
        WHERE id = ?1
        "#,
        params![
            screening.id,
            screening.status.as_str(),
            screening.provenance.as_str(),
            screening.last_completed.map(date_to_sql),
            screening.due_date.map(date_to_sql),
            screening.evidence_kind.map(|k| k.as_str()),
            screening.evidence_source_id,
            screening.confidence,
            screening.fingerprint,
            screening.active,
            screening.notes,
            screening.updated_at,
        ],
    )?;
    if rows_affected == 0 {
        return Err(DbError::NotFound(format!("screening {}", screening.id)));
    }
    Ok(())
}

/// Rewrite the matched-document links for a screening, preserving the
/// given order through the position column.
fn replace_links_tx(conn: &Connection, screening_id: &str, document_ids: &[String]) -> DbResult<()> {
    conn.execute(
        "DELETE FROM screening_documents WHERE screening_id = ?",
        [screening_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO screening_documents (screening_id, document_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, document_id) in document_ids.iter().enumerate() {
        stmt.execute(params![screening_id, document_id, position as i64])?;
    }
    Ok(())
}

fn links_for_screening(conn: &Connection, screening_id: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT document_id FROM screening_documents WHERE screening_id = ? ORDER BY position",
    )?;
    let rows = stmt.query_map([screening_id], |row| row.get(0))?;
    rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
}

impl Database {
    /// Insert a screening row together with its document links.
    pub fn insert_screening(&self, screening: &Screening) -> DbResult<()> {
        insert_screening_tx(&self.conn, screening)?;
        replace_links_tx(&self.conn, &screening.id, &screening.matched_document_ids)
    }

    /// Update a screening row in place and rewrite its document links.
    pub fn update_screening(&self, screening: &Screening) -> DbResult<()> {
        update_screening_tx(&self.conn, screening)?;
        replace_links_tx(&self.conn, &screening.id, &screening.matched_document_ids)
    }

    pub fn get_screening(&self, id: &str) -> DbResult<Option<Screening>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM screenings WHERE id = ?", SCREENING_COLUMNS),
                [id],
                read_screening_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut screening = Screening::try_from(row)?;
        screening.matched_document_ids = links_for_screening(&self.conn, &screening.id)?;
        Ok(Some(screening))
    }

    /// The row for a given patient and screening type, if one exists.
    /// At most one can, per the unique constraint.
    pub fn get_screening_for_type(
        &self,
        patient_id: &str,
        screening_type_id: &str,
    ) -> DbResult<Option<Screening>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM screenings WHERE patient_id = ?1 AND screening_type_id = ?2",
                    SCREENING_COLUMNS
                ),
                params![patient_id, screening_type_id],
                read_screening_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut screening = Screening::try_from(row)?;
        screening.matched_document_ids = links_for_screening(&self.conn, &screening.id)?;
        Ok(Some(screening))
    }

    /// All screening rows for a patient, active and retired, links loaded.
    pub fn list_screenings(&self, patient_id: &str) -> DbResult<Vec<Screening>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM screenings WHERE patient_id = ? ORDER BY screening_type_id",
            SCREENING_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], read_screening_row)?;
        let mut screenings = rows
            .map(|r| r.map_err(DbError::from).and_then(Screening::try_from))
            .collect::<DbResult<Vec<Screening>>>()?;
        for screening in &mut screenings {
            screening.matched_document_ids = links_for_screening(&self.conn, &screening.id)?;
        }
        Ok(screenings)
    }
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => RepositoryError::NotFound(what),
            DbError::Json(err) => RepositoryError::Serialization(err),
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

impl ScreeningRepository for Database {
    fn screenings_for_patient(&self, patient_id: &str) -> RepoResult<Vec<Screening>> {
        self.list_screenings(patient_id).map_err(Into::into)
    }

    fn live_document_ids(&self, patient_id: &str) -> RepoResult<HashSet<String>> {
        self.document_ids_for_patient(patient_id).map_err(Into::into)
    }

    fn apply_plan(&mut self, plan: &ReconcilePlan) -> RepoResult<ReconcileOutcome> {
        let tx = self.transaction()?;
        for row in &plan.create {
            insert_screening_tx(&tx, row)?;
            replace_links_tx(&tx, &row.id, &row.matched_document_ids)?;
        }
        for row in &plan.update {
            update_screening_tx(&tx, row)?;
            replace_links_tx(&tx, &row.id, &row.matched_document_ids)?;
        }
        for id in &plan.retire {
            tx.execute(
                "UPDATE screenings SET active = 0, updated_at = datetime('now') WHERE id = ?",
                [id],
            )
            .map_err(DbError::from)?;
        }
        for (screening_id, document_id) in &plan.orphan_links {
            tx.execute(
                "DELETE FROM screening_documents WHERE screening_id = ?1 AND document_id = ?2",
                params![screening_id, document_id],
            )
            .map_err(DbError::from)?;
        }
        tx.commit().map_err(DbError::from)?;

        Ok(ReconcileOutcome {
            created: plan.create.len() as u32,
            updated: plan.update.len() as u32,
            retired: plan.retire.len() as u32,
            orphans_cleaned: plan.orphan_links.len() as u32,
        })
    }
}
