//! Prepscreen Core Library
//!
//! Preventive-care screening engine: computes which screenings a patient
//! is due for from a configurable catalog, the coded problem list and
//! OCR'd document text, and keeps persisted recommendation rows in sync
//! with what the chart currently supports.
//!
//! # Architecture
//!
//! ```text
//! Catalog + patient chart (conditions, documents)
//!                     │
//!          Eligibility (age, gender)
//!                     │
//!     ┌───────────────┴───────────────┐
//!     ▼                               ▼
//! Condition triggers           Document keywords
//! (coded, three tiers)         (weighted, OCR text)
//!     └───────────────┬───────────────┘
//!                     ▼
//!      Evidence aggregation (most recent wins)
//!                     │
//!      Status computation (due / due soon / complete)
//!                     │
//!      Reconciliation (diff against stored rows, apply)
//!                     ▼
//!              screenings table
//! ```
//!
//! # Core Principle
//!
//! **Recomputation never destroys staff work.** Derived rows are rewritten
//! freely; a manually held sent-incomplete row survives every sweep until
//! strictly newer evidence supersedes it.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence layer
//! - [`models`]: Domain types (ScreeningType, Patient, Screening, etc.)
//! - [`catalog`]: Validated screening type catalog
//! - [`matcher`]: Condition trigger and document keyword matching
//! - [`engine`]: Per-patient evaluation pipeline
//! - [`reconcile`]: Row synchronization, audits and batch sweeps

pub mod catalog;
pub mod db;
pub mod engine;
pub mod matcher;
pub mod models;
pub mod reconcile;

// Re-export commonly used types
pub use catalog::ScreeningTypeCatalog;
pub use db::Database;
pub use engine::EngineConfig;
pub use matcher::{CodeCrosswalk, ConditionMatchPreview, KeywordPreview};
pub use models::{
    CodeSystem, Document, EvidenceKind, Frequency, FrequencyUnit, Gender, Keyword, Patient,
    PatientCondition, Screening, ScreeningResult, ScreeningStatus, ScreeningType, TriggerCondition,
};
pub use reconcile::{
    AuditFinding, AuditFindingKind, ReconcileOutcome, SweepFailure, SweepReport,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{info, warn};

// =========================================================================
// Service Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for ServiceError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => ServiceError::NotFound(what),
            db::DbError::Catalog(e) => ServiceError::InvalidInput(e.to_string()),
            other => ServiceError::DatabaseError(other.to_string()),
        }
    }
}

impl From<catalog::CatalogError> for ServiceError {
    fn from(e: catalog::CatalogError) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

impl From<reconcile::RepositoryError> for ServiceError {
    fn from(e: reconcile::RepositoryError) -> Self {
        match e {
            reconcile::RepositoryError::NotFound(what) => ServiceError::NotFound(what),
            reconcile::RepositoryError::Serialization(e) => {
                ServiceError::SerializationError(e.to_string())
            }
            other => ServiceError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ServiceError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ServiceError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point tying the catalog, matcher, engine and
/// persistence together.
pub struct ScreeningService {
    db: Arc<Mutex<Database>>,
    crosswalk: CodeCrosswalk,
    config: EngineConfig,
}

impl ScreeningService {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> Result<Self, ServiceError> {
        let db = Database::open(path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            crosswalk: CodeCrosswalk::new(),
            config: EngineConfig::default(),
        })
    }

    /// Create an in-memory service (for testing).
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            crosswalk: CodeCrosswalk::new(),
            config: EngineConfig::default(),
        })
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a screening type.
    pub fn upsert_screening_type(&self, ty: &ScreeningType) -> Result<(), ServiceError> {
        catalog::validate_type(ty)?;
        let db = self.db.lock()?;
        db.upsert_screening_type(ty)?;
        Ok(())
    }

    /// Get a screening type by id.
    pub fn get_screening_type(&self, id: &str) -> Result<Option<ScreeningType>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.get_screening_type(id)?)
    }

    /// Get a screening type by its unique name.
    pub fn get_screening_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ScreeningType>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.get_screening_type_by_name(name)?)
    }

    /// List all screening types by name, active and inactive.
    pub fn list_screening_types(&self) -> Result<Vec<ScreeningType>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.list_screening_types()?)
    }

    /// Soft-deactivate a screening type.
    pub fn deactivate_screening_type(&self, id: &str) -> Result<bool, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.deactivate_screening_type(id)?)
    }

    /// Hard-delete a screening type with no screening rows.
    pub fn delete_screening_type(&self, id: &str) -> Result<(), ServiceError> {
        let db = self.db.lock()?;
        Ok(db.delete_screening_type(id)?)
    }

    /// Import validated screening types in one transaction, matching
    /// existing types by name so their screening rows stay linked.
    pub fn import_screening_types(&self, types: &[ScreeningType]) -> Result<u32, ServiceError> {
        // Catalog construction validates the batch as a whole.
        ScreeningTypeCatalog::new(types.to_vec())?;
        let mut db = self.db.lock()?;
        let count = db.import_screening_types(types)?;
        info!(count, "imported screening types");
        Ok(count)
    }

    /// Import screening type definitions from a JSON array.
    pub fn import_catalog_json(&self, json: &str) -> Result<u32, ServiceError> {
        let types = catalog::from_json(json)?;
        self.import_screening_types(&types)
    }

    // =========================================================================
    // Chart Operations
    // =========================================================================

    /// Add or update a patient.
    pub fn upsert_patient(&self, patient: &Patient) -> Result<(), ServiceError> {
        let db = self.db.lock()?;
        db.upsert_patient(patient)?;
        Ok(())
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: &str) -> Result<Option<Patient>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(id)?)
    }

    /// Record a problem-list condition.
    pub fn add_condition(&self, condition: &PatientCondition) -> Result<(), ServiceError> {
        let db = self.db.lock()?;
        db.insert_condition(condition)?;
        Ok(())
    }

    /// The patient's problem list, newest diagnosis first.
    pub fn conditions_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<PatientCondition>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.conditions_for_patient(patient_id)?)
    }

    /// Store an ingested document with its extracted text.
    pub fn add_document(&self, document: &Document) -> Result<(), ServiceError> {
        let db = self.db.lock()?;
        db.insert_document(document)?;
        Ok(())
    }

    /// Delete a document. Links from screenings are cleaned up by the
    /// next reconcile, not here.
    pub fn delete_document(&self, id: &str) -> Result<bool, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.delete_document(id)?)
    }

    /// The patient's documents, newest first.
    pub fn documents_for_patient(&self, patient_id: &str) -> Result<Vec<Document>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.documents_for_patient(patient_id)?)
    }

    // =========================================================================
    // Evaluation Operations
    // =========================================================================

    /// Compute fresh recommendations for one patient without writing
    /// anything. Results come back in catalog order.
    pub fn evaluate_patient(
        &self,
        patient_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<ScreeningResult>, ServiceError> {
        let db = self.db.lock()?;
        let catalog = db.load_catalog()?;
        let (patient, conditions, documents) = load_chart(&db, patient_id)?;
        Ok(engine::evaluate_patient(
            &catalog,
            &self.crosswalk,
            &patient,
            &conditions,
            &documents,
            today,
            &self.config,
        ))
    }

    /// Run one screening type's keywords against sample text, for tuning
    /// keyword sets without saving a document.
    pub fn test_keyword_match(
        &self,
        screening_type_id: &str,
        sample_text: &str,
    ) -> Result<KeywordPreview, ServiceError> {
        let db = self.db.lock()?;
        let ty = db.get_screening_type(screening_type_id)?.ok_or_else(|| {
            ServiceError::NotFound(format!("screening type {}", screening_type_id))
        })?;
        Ok(matcher::preview_keywords(&ty, sample_text))
    }

    /// Which active screening types would a condition with this coding
    /// trigger? Ranked by confidence, then name.
    pub fn test_condition_match(
        &self,
        system: Option<CodeSystem>,
        code: Option<&str>,
        display: Option<&str>,
    ) -> Result<Vec<ConditionMatchPreview>, ServiceError> {
        let db = self.db.lock()?;
        let catalog = db.load_catalog()?;
        Ok(matcher::match_screening_types(
            catalog.active(),
            &self.crosswalk,
            system,
            code,
            display,
        ))
    }

    // =========================================================================
    // Screening Row Operations
    // =========================================================================

    /// All persisted screening rows for a patient, active and retired.
    pub fn screenings_for_patient(&self, patient_id: &str) -> Result<Vec<Screening>, ServiceError> {
        let db = self.db.lock()?;
        Ok(db.list_screenings(patient_id)?)
    }

    /// Record that an outreach letter went out for a screening. The row
    /// holds at sent-incomplete through sweeps until newer evidence
    /// arrives.
    pub fn mark_sent_incomplete(
        &self,
        patient_id: &str,
        screening_type_id: &str,
        note: Option<String>,
    ) -> Result<Screening, ServiceError> {
        let db = self.db.lock()?;
        if db.get_screening_type(screening_type_id)?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "screening type {}",
                screening_type_id
            )));
        }
        if db.get_patient(patient_id)?.is_none() {
            return Err(ServiceError::NotFound(format!("patient {}", patient_id)));
        }
        match db.get_screening_for_type(patient_id, screening_type_id)? {
            Some(mut row) => {
                row.mark_sent_incomplete(note);
                db.update_screening(&row)?;
                info!(patient_id = %patient_id, screening_id = %row.id, "marked sent-incomplete");
                Ok(row)
            }
            None => {
                let row = Screening::manual_hold(patient_id, screening_type_id, note);
                db.insert_screening(&row)?;
                info!(patient_id = %patient_id, screening_id = %row.id, "created sent-incomplete row");
                Ok(row)
            }
        }
    }

    /// Recompute one patient and write whatever changed. Applies in a
    /// single transaction; an unchanged patient is a no-op.
    pub fn reconcile_patient(
        &self,
        patient_id: &str,
        today: NaiveDate,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let mut db = self.db.lock()?;
        let catalog = db.load_catalog()?;
        let (patient, conditions, documents) = load_chart(&db, patient_id)?;
        let results = engine::evaluate_patient(
            &catalog,
            &self.crosswalk,
            &patient,
            &conditions,
            &documents,
            today,
            &self.config,
        );
        Ok(reconcile::reconcile_patient(
            &mut *db,
            patient_id,
            &results,
        )?)
    }

    /// Report drift between stored rows and a fresh evaluation without
    /// writing anything.
    pub fn audit_patient(
        &self,
        patient_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<AuditFinding>, ServiceError> {
        let db = self.db.lock()?;
        let catalog = db.load_catalog()?;
        let (patient, conditions, documents) = load_chart(&db, patient_id)?;
        let results = engine::evaluate_patient(
            &catalog,
            &self.crosswalk,
            &patient,
            &conditions,
            &documents,
            today,
            &self.config,
        );
        Ok(reconcile::audit_patient(&*db, patient_id, &results)?)
    }

    // =========================================================================
    // Sweep Operations
    // =========================================================================

    /// Reconcile every patient. One patient failing does not stop the
    /// sweep; the cancel flag does, between patients, leaving already
    /// reconciled patients committed.
    pub fn sweep(&self, today: NaiveDate, cancel: &AtomicBool) -> Result<SweepReport, ServiceError> {
        let mut db = self.db.lock()?;
        let catalog = db.load_catalog()?;
        let patient_ids = db.list_patient_ids()?;
        info!(patients = patient_ids.len(), "starting screening sweep");

        let mut report = SweepReport::default();
        for patient_id in patient_ids {
            if cancel.load(Ordering::Relaxed) {
                warn!(
                    processed = report.patients_processed,
                    "sweep cancelled before completion"
                );
                report.cancelled = true;
                break;
            }
            match sweep_one(
                &mut db,
                &catalog,
                &self.crosswalk,
                &self.config,
                &patient_id,
                today,
            ) {
                Ok(outcome) => {
                    report.patients_processed += 1;
                    report.totals.absorb(&outcome);
                }
                Err(err) => {
                    warn!(patient_id = %patient_id, error = %err, "sweep failed for patient");
                    report.failures.push(SweepFailure {
                        patient_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.patients_processed,
            failures = report.failures.len(),
            created = report.totals.created,
            updated = report.totals.updated,
            retired = report.totals.retired,
            orphans_cleaned = report.totals.orphans_cleaned,
            cancelled = report.cancelled,
            "sweep finished"
        );
        Ok(report)
    }
}

fn load_chart(
    db: &Database,
    patient_id: &str,
) -> Result<(Patient, Vec<PatientCondition>, Vec<Document>), ServiceError> {
    let patient = db
        .get_patient(patient_id)?
        .ok_or_else(|| ServiceError::NotFound(format!("patient {}", patient_id)))?;
    let conditions = db.conditions_for_patient(patient_id)?;
    let documents = db.documents_for_patient(patient_id)?;
    Ok((patient, conditions, documents))
}

fn sweep_one(
    db: &mut Database,
    catalog: &ScreeningTypeCatalog,
    crosswalk: &CodeCrosswalk,
    config: &EngineConfig,
    patient_id: &str,
    today: NaiveDate,
) -> Result<ReconcileOutcome, ServiceError> {
    let (patient, conditions, documents) = load_chart(db, patient_id)?;
    let results = engine::evaluate_patient(
        catalog,
        crosswalk,
        &patient,
        &conditions,
        &documents,
        today,
        config,
    );
    Ok(reconcile::reconcile_patient(db, patient_id, &results)?)
}
