//! Patient and chart condition models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::screening_type::{CodeSystem, Gender};

/// A patient as seen by the screening engine.
///
/// Demographics come from the upstream chart system; age is supplied in
/// whole years rather than derived here so evaluation stays a pure
/// function of its inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Age in whole years, if recorded
    pub age: Option<u32>,
    /// Gender, if recorded
    pub gender: Option<Gender>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
    /// Last update timestamp (RFC3339)
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            age: None,
            gender: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A coded or free-text condition on a patient's problem list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientCondition {
    /// Unique identifier
    pub id: String,
    /// Owning patient
    pub patient_id: String,
    /// Condition name as recorded (e.g. "Type 2 diabetes mellitus")
    pub name: String,
    /// Coding system, when the condition was coded
    pub system: Option<CodeSystem>,
    /// Code within the system, when coded
    pub code: Option<String>,
    /// Whether the condition is currently active on the problem list
    pub active: bool,
    /// Date of diagnosis; used as the evidence date for trigger matches
    pub diagnosed_date: NaiveDate,
    /// When the condition was recorded (RFC3339)
    pub recorded_at: String,
}

impl PatientCondition {
    /// Create a new active condition.
    pub fn new(patient_id: String, name: String, diagnosed_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            name,
            system: None,
            code: None,
            active: true,
            diagnosed_date,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The (system, code) pair when both are present.
    pub fn coding(&self) -> Option<(CodeSystem, &str)> {
        match (self.system, self.code.as_deref()) {
            (Some(system), Some(code)) => Some((system, code)),
            _ => None,
        }
    }
}
