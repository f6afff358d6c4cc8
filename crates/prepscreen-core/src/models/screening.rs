//! Screening recommendation models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::evidence::EvidenceKind;

/// Status of a screening recommendation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    /// Overdue or never satisfied
    Due,
    /// Satisfied, but the next due date falls within the soon window
    DueSoon,
    /// Satisfied, next due date beyond the soon window
    Complete,
    /// An outreach letter went out but results never came back
    SentIncomplete,
}

impl ScreeningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreeningStatus::Due => "due",
            ScreeningStatus::DueSoon => "due_soon",
            ScreeningStatus::Complete => "complete",
            ScreeningStatus::SentIncomplete => "sent_incomplete",
        }
    }

    pub fn parse(s: &str) -> Option<ScreeningStatus> {
        match s {
            "due" => Some(ScreeningStatus::Due),
            "due_soon" => Some(ScreeningStatus::DueSoon),
            "complete" => Some(ScreeningStatus::Complete),
            "sent_incomplete" => Some(ScreeningStatus::SentIncomplete),
            _ => None,
        }
    }
}

/// Where a screening row's current state came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Written by recomputation
    Derived,
    /// Set by a staff workflow action (e.g. marking a letter sent)
    Manual,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Derived => "derived",
            Provenance::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Provenance> {
        match s {
            "derived" => Some(Provenance::Derived),
            "manual" => Some(Provenance::Manual),
            _ => None,
        }
    }
}

/// The computed recommendation for one screening type, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningResult {
    pub screening_type_id: String,
    pub screening_type_name: String,
    pub status: ScreeningStatus,
    /// Date of the most recent qualifying evidence
    pub last_completed: Option<NaiveDate>,
    /// Next due date derived from last_completed and the frequency
    pub due_date: Option<NaiveDate>,
    /// Kind of the best evidence, when any matched
    pub evidence_kind: Option<EvidenceKind>,
    /// Id of the condition or document behind the best evidence
    pub evidence_source_id: Option<String>,
    /// Confidence of the best evidence
    pub confidence: Option<f64>,
    /// All matched documents, most recent first
    pub matched_document_ids: Vec<String>,
}

/// Derived fields in a fixed order for hashing. Document ids are sorted
/// so the fingerprint does not depend on match ordering, and the display
/// name is excluded so renames do not dirty every row.
#[derive(Serialize)]
struct FingerprintPayload<'a> {
    screening_type_id: &'a str,
    status: ScreeningStatus,
    last_completed: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    evidence_kind: Option<EvidenceKind>,
    evidence_source_id: Option<&'a str>,
    confidence: Option<f64>,
    matched_document_ids: Vec<&'a str>,
}

impl ScreeningResult {
    /// Canonical JSON of the derived fields.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let mut doc_ids: Vec<&str> = self.matched_document_ids.iter().map(|s| s.as_str()).collect();
        doc_ids.sort_unstable();
        serde_json::to_string(&FingerprintPayload {
            screening_type_id: &self.screening_type_id,
            status: self.status,
            last_completed: self.last_completed,
            due_date: self.due_date,
            evidence_kind: self.evidence_kind,
            evidence_source_id: self.evidence_source_id.as_deref(),
            confidence: self.confidence,
            matched_document_ids: doc_ids,
        })
    }

    /// SHA-256 of the canonical JSON, hex encoded.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = self.canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// A persisted screening recommendation row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Screening {
    pub id: String,
    pub patient_id: String,
    pub screening_type_id: String,
    pub status: ScreeningStatus,
    pub provenance: Provenance,
    pub last_completed: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub evidence_kind: Option<EvidenceKind>,
    pub evidence_source_id: Option<String>,
    pub confidence: Option<f64>,
    /// Matched documents, most recent first (join table rows)
    pub matched_document_ids: Vec<String>,
    /// Fingerprint of the derived fields as last written
    pub fingerprint: String,
    /// False once retired (type deactivated or patient no longer eligible)
    pub active: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Screening {
    /// Build a fresh row from a computed result.
    pub fn from_result(patient_id: &str, result: &ScreeningResult) -> Result<Self, serde_json::Error> {
        let now = chrono::Utc::now().to_rfc3339();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            screening_type_id: result.screening_type_id.clone(),
            status: result.status,
            provenance: Provenance::Derived,
            last_completed: result.last_completed,
            due_date: result.due_date,
            evidence_kind: result.evidence_kind,
            evidence_source_id: result.evidence_source_id.clone(),
            confidence: result.confidence,
            matched_document_ids: result.matched_document_ids.clone(),
            fingerprint: result.fingerprint()?,
            active: true,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Build a manually held row for a type that has no persisted
    /// screening yet. The empty fingerprint never matches a computed
    /// one, and manual holds skip the comparison anyway.
    pub fn manual_hold(patient_id: &str, screening_type_id: &str, note: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            screening_type_id: screening_type_id.to_string(),
            status: ScreeningStatus::SentIncomplete,
            provenance: Provenance::Manual,
            last_completed: None,
            due_date: None,
            evidence_kind: None,
            evidence_source_id: None,
            confidence: None,
            matched_document_ids: Vec::new(),
            fingerprint: String::new(),
            active: true,
            notes: note,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Overwrite the derived fields from a recomputed result, keeping
    /// identity, notes and creation time.
    pub fn apply_result(&mut self, result: &ScreeningResult) -> Result<(), serde_json::Error> {
        self.status = result.status;
        self.provenance = Provenance::Derived;
        self.last_completed = result.last_completed;
        self.due_date = result.due_date;
        self.evidence_kind = result.evidence_kind;
        self.evidence_source_id = result.evidence_source_id.clone();
        self.confidence = result.confidence;
        self.matched_document_ids = result.matched_document_ids.clone();
        self.fingerprint = result.fingerprint()?;
        self.active = true;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }

    /// Mark this screening as sent-but-incomplete via a staff action.
    pub fn mark_sent_incomplete(&mut self, note: Option<String>) {
        self.status = ScreeningStatus::SentIncomplete;
        self.provenance = Provenance::Manual;
        if note.is_some() {
            self.notes = note;
        }
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Whether this row is held by a manual sent-incomplete action.
    pub fn is_manual_hold(&self) -> bool {
        self.provenance == Provenance::Manual && self.status == ScreeningStatus::SentIncomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result() -> ScreeningResult {
        ScreeningResult {
            screening_type_id: "st-1".into(),
            screening_type_name: "Mammogram".into(),
            status: ScreeningStatus::Complete,
            last_completed: NaiveDate::from_ymd_opt(2025, 1, 15),
            due_date: NaiveDate::from_ymd_opt(2026, 1, 15),
            evidence_kind: Some(EvidenceKind::Document),
            evidence_source_id: Some("doc-1".into()),
            confidence: Some(0.8),
            matched_document_ids: vec!["doc-1".into(), "doc-2".into()],
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            ScreeningStatus::Due,
            ScreeningStatus::DueSoon,
            ScreeningStatus::Complete,
            ScreeningStatus::SentIncomplete,
        ] {
            assert_eq!(ScreeningStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ScreeningStatus::parse("bogus"), None);
    }

    #[test]
    fn test_fingerprint_ignores_document_order_and_name() {
        let a = make_result();
        let mut b = make_result();
        b.matched_document_ids = vec!["doc-2".into(), "doc-1".into()];
        b.screening_type_name = "Mammogram (bilateral)".into();

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_derived_fields() {
        let a = make_result();
        let mut b = make_result();
        b.status = ScreeningStatus::Due;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let mut c = make_result();
        c.last_completed = NaiveDate::from_ymd_opt(2025, 2, 1);
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn test_from_result_and_apply() {
        let result = make_result();
        let mut row = Screening::from_result("p1", &result).unwrap();
        assert_eq!(row.fingerprint, result.fingerprint().unwrap());
        assert_eq!(row.provenance, Provenance::Derived);
        assert!(row.active);

        row.mark_sent_incomplete(Some("letter mailed 3/4".into()));
        assert!(row.is_manual_hold());

        let mut updated = make_result();
        updated.status = ScreeningStatus::Due;
        row.apply_result(&updated).unwrap();
        assert_eq!(row.status, ScreeningStatus::Due);
        assert_eq!(row.provenance, Provenance::Derived);
        assert_eq!(row.notes, Some("letter mailed 3/4".into()));
    }
}
