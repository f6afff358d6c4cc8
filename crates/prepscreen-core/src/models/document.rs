//! Clinical document models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A clinical document attached to a patient's chart.
///
/// Content is whatever text extraction produced; scanned documents that
/// failed OCR arrive with empty content and are matched on filename only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub id: String,
    /// Owning patient
    pub patient_id: String,
    /// Document category (e.g. "lab_report", "imaging", "referral")
    pub doc_type: String,
    /// Original filename
    pub filename: String,
    /// Extracted text content, possibly empty
    pub content: String,
    /// Clinical date of the document; used as the evidence date
    pub document_date: NaiveDate,
    /// Whether OCR ran on this document
    pub ocr_processed: bool,
    /// OCR confidence in [0.0, 1.0], when OCR ran
    pub ocr_confidence: Option<f64>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
}

impl Document {
    /// Create a new document with required fields.
    pub fn new(
        patient_id: String,
        doc_type: String,
        filename: String,
        document_date: NaiveDate,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            doc_type,
            filename,
            content: String::new(),
            document_date,
            ocr_processed: false,
            ocr_confidence: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Length of the extracted text.
    pub fn text_len(&self) -> usize {
        self.content.len()
    }
}
