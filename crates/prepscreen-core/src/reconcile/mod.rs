//! Reconciliation of computed results against persisted screening rows.
//!
//! Two phases, deliberately separate: `plan` is a pure diff of the
//! computed results against what storage holds, and `apply_plan` (on the
//! repository) commits the whole plan in one transaction. Running
//! reconcile twice over unchanged data yields an empty plan.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Screening, ScreeningResult};

/// Errors surfaced through the repository seam.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Storage operations reconciliation needs. The engine never talks to
/// the database directly; anything implementing this can back it.
pub trait ScreeningRepository {
    /// All screening rows for a patient, active and retired, with their
    /// matched-document links loaded.
    fn screenings_for_patient(&self, patient_id: &str) -> RepoResult<Vec<Screening>>;

    /// Ids of documents that currently exist for a patient.
    fn live_document_ids(&self, patient_id: &str) -> RepoResult<HashSet<String>>;

    /// Apply a plan atomically: every change commits or none do.
    fn apply_plan(&mut self, plan: &ReconcilePlan) -> RepoResult<ReconcileOutcome>;
}

/// The full set of changes needed to bring one patient's rows in line
/// with a computed result set.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub patient_id: String,
    /// New rows for newly eligible types
    pub create: Vec<Screening>,
    /// Full row images for rows whose derived fields changed
    pub update: Vec<Screening>,
    /// Ids of active rows whose type is no longer eligible
    pub retire: Vec<String>,
    /// (screening_id, document_id) links pointing at deleted documents
    pub orphan_links: Vec<(String, String)>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update.is_empty()
            && self.retire.is_empty()
            && self.orphan_links.is_empty()
    }
}

/// Counts of changes applied by one reconcile pass.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: u32,
    pub updated: u32,
    pub retired: u32,
    pub orphans_cleaned: u32,
}

impl ReconcileOutcome {
    /// Accumulate another outcome into this one (for sweep totals).
    pub fn absorb(&mut self, other: &ReconcileOutcome) {
        self.created += other.created;
        self.updated += other.updated;
        self.retired += other.retired;
        self.orphans_cleaned += other.orphans_cleaned;
    }
}

/// Whether a recomputed result carries evidence strictly newer than what
/// a manually held row last saw. Only such evidence releases the hold.
fn supersedes_hold(result: &ScreeningResult, row: &Screening) -> bool {
    match (result.last_completed, row.last_completed) {
        (Some(new), Some(held)) => new > held,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Diff computed results against persisted rows. Pure: reads nothing,
/// writes nothing.
pub fn plan(
    patient_id: &str,
    results: &[ScreeningResult],
    existing: &[Screening],
    live_docs: &HashSet<String>,
) -> RepoResult<ReconcilePlan> {
    let mut plan = ReconcilePlan {
        patient_id: patient_id.to_string(),
        ..Default::default()
    };

    let by_type: HashMap<&str, &Screening> = existing
        .iter()
        .map(|s| (s.screening_type_id.as_str(), s))
        .collect();
    let mut rewritten: HashSet<&str> = HashSet::new();

    for result in results {
        match by_type.get(result.screening_type_id.as_str()) {
            None => {
                plan.create.push(Screening::from_result(patient_id, result)?);
            }
            Some(row) => {
                if row.active && row.is_manual_hold() && !supersedes_hold(result, row) {
                    // Held by a staff action; recomputation leaves it alone.
                    continue;
                }
                let fingerprint = result.fingerprint()?;
                if !row.active || row.fingerprint != fingerprint {
                    let mut updated = (*row).clone();
                    updated.apply_result(result)?;
                    plan.update.push(updated);
                    rewritten.insert(row.id.as_str());
                }
            }
        }
    }

    let result_types: HashSet<&str> = results
        .iter()
        .map(|r| r.screening_type_id.as_str())
        .collect();

    for row in existing {
        if row.active && !result_types.contains(row.screening_type_id.as_str()) {
            plan.retire.push(row.id.clone());
        }
        // Rows getting a full rewrite have their link set replaced anyway.
        if !rewritten.contains(row.id.as_str()) {
            for doc_id in &row.matched_document_ids {
                if !live_docs.contains(doc_id) {
                    plan.orphan_links.push((row.id.clone(), doc_id.clone()));
                }
            }
        }
    }

    Ok(plan)
}

/// Plan and apply in one call. The patient's rows end up consistent with
/// `results`; an unchanged patient is a no-op.
pub fn reconcile_patient<R: ScreeningRepository>(
    repo: &mut R,
    patient_id: &str,
    results: &[ScreeningResult],
) -> RepoResult<ReconcileOutcome> {
    let existing = repo.screenings_for_patient(patient_id)?;
    let live_docs = repo.live_document_ids(patient_id)?;
    let plan = plan(patient_id, results, &existing, &live_docs)?;

    if plan.is_empty() {
        debug!(patient_id = %patient_id, "reconcile plan empty");
        return Ok(ReconcileOutcome::default());
    }

    let outcome = repo.apply_plan(&plan)?;
    info!(
        patient_id = %patient_id,
        created = outcome.created,
        updated = outcome.updated,
        retired = outcome.retired,
        orphans_cleaned = outcome.orphans_cleaned,
        "reconciled patient"
    );
    Ok(outcome)
}

/// Kinds of drift the audit can report.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditFindingKind {
    /// A computed result has no active row
    MissingRow,
    /// An active row's fingerprint disagrees with the fresh computation
    StaleRow,
    /// An active row's type is no longer eligible for this patient
    IneligibleRow,
    /// A matched-document link points at a deleted document
    DanglingDocumentLink,
}

/// One piece of drift between storage and a fresh evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditFinding {
    pub screening_type_id: String,
    pub screening_id: Option<String>,
    pub kind: AuditFindingKind,
    pub detail: String,
}

/// Compare persisted rows against a fresh evaluation without writing.
/// Manually held rows are expected to disagree and are not reported.
pub fn audit_patient<R: ScreeningRepository>(
    repo: &R,
    patient_id: &str,
    results: &[ScreeningResult],
) -> RepoResult<Vec<AuditFinding>> {
    let existing = repo.screenings_for_patient(patient_id)?;
    let live_docs = repo.live_document_ids(patient_id)?;
    let mut findings = Vec::new();

    let by_type: HashMap<&str, &Screening> = existing
        .iter()
        .map(|s| (s.screening_type_id.as_str(), s))
        .collect();

    for result in results {
        match by_type.get(result.screening_type_id.as_str()) {
            Some(row) if row.active => {
                if row.is_manual_hold() {
                    continue;
                }
                let fingerprint = result.fingerprint()?;
                if row.fingerprint != fingerprint {
                    findings.push(AuditFinding {
                        screening_type_id: result.screening_type_id.clone(),
                        screening_id: Some(row.id.clone()),
                        kind: AuditFindingKind::StaleRow,
                        detail: format!(
                            "stored fingerprint {} != computed {}",
                            row.fingerprint, fingerprint
                        ),
                    });
                }
            }
            _ => {
                findings.push(AuditFinding {
                    screening_type_id: result.screening_type_id.clone(),
                    screening_id: None,
                    kind: AuditFindingKind::MissingRow,
                    detail: format!("no active row for '{}'", result.screening_type_name),
                });
            }
        }
    }

    let result_types: HashSet<&str> = results
        .iter()
        .map(|r| r.screening_type_id.as_str())
        .collect();

    for row in existing {
        if row.active && !result_types.contains(row.screening_type_id.as_str()) {
            findings.push(AuditFinding {
                screening_type_id: row.screening_type_id.clone(),
                screening_id: Some(row.id.clone()),
                kind: AuditFindingKind::IneligibleRow,
                detail: "active row for a type this patient is not eligible for".to_string(),
            });
        }
        for doc_id in &row.matched_document_ids {
            if !live_docs.contains(doc_id) {
                findings.push(AuditFinding {
                    screening_type_id: row.screening_type_id.clone(),
                    screening_id: Some(row.id.clone()),
                    kind: AuditFindingKind::DanglingDocumentLink,
                    detail: format!("link to deleted document {}", doc_id),
                });
            }
        }
    }

    Ok(findings)
}

/// One patient that failed during a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub patient_id: String,
    pub error: String,
}

/// Summary of a batch recomputation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub patients_processed: u32,
    pub totals: ReconcileOutcome,
    pub failures: Vec<SweepFailure>,
    /// True when the cancellation flag stopped the sweep early
    pub cancelled: bool,
}
