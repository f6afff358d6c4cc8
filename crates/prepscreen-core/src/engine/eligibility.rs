//! Patient eligibility filtering.

use tracing::debug;

use crate::catalog::ScreeningTypeCatalog;
use crate::models::{Patient, ScreeningType};

/// Active screening types applicable to a patient, in catalog order.
pub fn eligible_types<'a>(
    catalog: &'a ScreeningTypeCatalog,
    patient: &Patient,
) -> Vec<&'a ScreeningType> {
    catalog
        .active()
        .filter(|ty| is_eligible(ty, patient))
        .collect()
}

/// Apply age and gender restrictions for one screening type.
///
/// Missing demographics exclude conservatively: a patient with no recorded
/// age never gets an age-restricted screening recommended, and likewise
/// for gender. The exclusion is logged so chart-data gaps stay visible.
pub fn is_eligible(ty: &ScreeningType, patient: &Patient) -> bool {
    if !ty.matches_age(patient.age) {
        if patient.age.is_none() {
            debug!(
                patient_id = %patient.id,
                screening_type = %ty.name,
                "age unknown, excluding age-restricted screening"
            );
        }
        return false;
    }
    if !ty.matches_gender(patient.gender) {
        if patient.gender.is_none() {
            debug!(
                patient_id = %patient.id,
                screening_type = %ty.name,
                "gender unknown, excluding gender-restricted screening"
            );
        }
        return false;
    }
    true
}
