//! Pure evaluation pipeline.
//!
//! Evaluation never touches storage: given a catalog, a patient's chart
//! data and a date, it produces the same results every time. Persistence
//! of those results is reconciliation's job.

mod eligibility;
mod evidence;
mod status;

pub use eligibility::*;
pub use evidence::*;
pub use status::*;

use chrono::NaiveDate;
use tracing::debug;

use crate::catalog::ScreeningTypeCatalog;
use crate::matcher::CodeCrosswalk;
use crate::models::{Document, Patient, PatientCondition, ScreeningResult};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Width of the "due soon" window, in days
    pub soon_window_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            soon_window_days: DEFAULT_SOON_WINDOW_DAYS,
        }
    }
}

/// Evaluate every eligible screening type for one patient.
///
/// Results come back in catalog (name) order, one per eligible type.
pub fn evaluate_patient(
    catalog: &ScreeningTypeCatalog,
    crosswalk: &CodeCrosswalk,
    patient: &Patient,
    conditions: &[PatientCondition],
    documents: &[Document],
    today: NaiveDate,
    config: &EngineConfig,
) -> Vec<ScreeningResult> {
    let eligible = eligible_types(catalog, patient);
    debug!(
        patient_id = %patient.id,
        eligible = eligible.len(),
        conditions = conditions.len(),
        documents = documents.len(),
        "evaluating patient"
    );

    eligible
        .into_iter()
        .map(|ty| {
            let set = gather(ty, conditions, documents, crosswalk);
            let last_completed = set.best.as_ref().map(|e| e.date());
            let (status, due_date) =
                compute_status(last_completed, &ty.frequency, today, config.soon_window_days);

            ScreeningResult {
                screening_type_id: ty.id.clone(),
                screening_type_name: ty.name.clone(),
                status,
                last_completed,
                due_date,
                evidence_kind: set.best.as_ref().map(|e| e.kind()),
                evidence_source_id: set.best.as_ref().map(|e| e.source_id().to_string()),
                confidence: set.best.as_ref().map(|e| e.confidence()),
                matched_document_ids: set
                    .documents
                    .iter()
                    .map(|d| d.document_id.clone())
                    .collect(),
            }
        })
        .collect()
}
