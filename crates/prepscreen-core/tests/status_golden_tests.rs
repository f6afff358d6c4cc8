//! Golden tests for the evaluation pipeline.
//!
//! Each case runs one screening type and one piece of document evidence
//! through the full evaluate path and checks the resulting status.

use chrono::{Duration, NaiveDate};

use prepscreen_core::catalog::{trigger, ScreeningTypeCatalog};
use prepscreen_core::engine::{evaluate_patient, EngineConfig};
use prepscreen_core::matcher::CodeCrosswalk;
use prepscreen_core::models::{
    CodeSystem, Document, EvidenceKind, Frequency, FrequencyUnit, Gender, Keyword, Patient,
    PatientCondition, ScreeningStatus, ScreeningType,
};

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn make_type(frequency_count: u32, frequency_unit: FrequencyUnit) -> ScreeningType {
    let mut ty = ScreeningType::new(
        "Colonoscopy".into(),
        Frequency {
            count: frequency_count,
            unit: frequency_unit,
        },
    );
    ty.keywords.push(Keyword::new("colonoscopy".into()));
    ty
}

fn make_patient() -> Patient {
    let mut patient = Patient::new("Ada".into());
    patient.age = Some(58);
    patient.gender = Some(Gender::Female);
    patient
}

fn make_document(patient_id: &str, date: NaiveDate) -> Document {
    let mut doc = Document::new(
        patient_id.into(),
        "procedure_note".into(),
        "colonoscopy_note.pdf".into(),
        date,
    );
    doc.content = "Screening colonoscopy performed, no polyps seen.".into();
    doc.ocr_processed = true;
    doc
}

struct GoldenCase {
    id: &'static str,
    frequency_count: u32,
    frequency_unit: FrequencyUnit,
    /// Age of the matching document; None means no evidence at all
    days_since_evidence: Option<i64>,
    expected_status: ScreeningStatus,
    expect_due_date: bool,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "annual-overdue",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(400),
            expected_status: ScreeningStatus::Due,
            expect_due_date: true,
        },
        GoldenCase {
            id: "annual-recent",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(30),
            expected_status: ScreeningStatus::Complete,
            expect_due_date: true,
        },
        GoldenCase {
            id: "annual-approaching",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(310),
            expected_status: ScreeningStatus::DueSoon,
            expect_due_date: true,
        },
        GoldenCase {
            id: "no-evidence",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: None,
            expected_status: ScreeningStatus::Due,
            expect_due_date: false,
        },
        GoldenCase {
            // Due in exactly 60 days, the inclusive edge of the window.
            id: "window-edge-inside",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(305),
            expected_status: ScreeningStatus::DueSoon,
            expect_due_date: true,
        },
        GoldenCase {
            // Due in 61 days, one past the window.
            id: "window-edge-outside",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(304),
            expected_status: ScreeningStatus::Complete,
            expect_due_date: true,
        },
        GoldenCase {
            id: "due-exactly-today",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(365),
            expected_status: ScreeningStatus::DueSoon,
            expect_due_date: true,
        },
        GoldenCase {
            id: "one-day-overdue",
            frequency_count: 1,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(366),
            expected_status: ScreeningStatus::Due,
            expect_due_date: true,
        },
        GoldenCase {
            id: "semiannual-overdue",
            frequency_count: 6,
            frequency_unit: FrequencyUnit::Months,
            days_since_evidence: Some(200),
            expected_status: ScreeningStatus::Due,
            expect_due_date: true,
        },
        GoldenCase {
            id: "ten-year-interval-recent",
            frequency_count: 10,
            frequency_unit: FrequencyUnit::Years,
            days_since_evidence: Some(400),
            expected_status: ScreeningStatus::Complete,
            expect_due_date: true,
        },
    ]
}

#[test]
fn test_golden_cases() {
    let today = fixed_today();
    let crosswalk = CodeCrosswalk::new();

    for case in get_golden_cases() {
        let ty = make_type(case.frequency_count, case.frequency_unit);
        let catalog = ScreeningTypeCatalog::new(vec![ty]).unwrap();
        let patient = make_patient();

        let documents: Vec<Document> = case
            .days_since_evidence
            .map(|days| make_document(&patient.id, today - Duration::days(days)))
            .into_iter()
            .collect();

        let results = evaluate_patient(
            &catalog,
            &crosswalk,
            &patient,
            &[],
            &documents,
            today,
            &EngineConfig::default(),
        );

        assert_eq!(results.len(), 1, "Case {}: expected one result", case.id);
        let result = &results[0];

        assert_eq!(
            result.status, case.expected_status,
            "Case {}: status mismatch",
            case.id
        );
        assert_eq!(
            result.due_date.is_some(),
            case.expect_due_date,
            "Case {}: due date presence mismatch",
            case.id
        );
        if let Some(days) = case.days_since_evidence {
            assert_eq!(
                result.last_completed,
                Some(today - Duration::days(days)),
                "Case {}: last_completed mismatch",
                case.id
            );
        }
    }
}

#[test]
fn test_condition_trigger_drives_recommendation() {
    // A diabetic with no A1c documents: the condition keeps the lab
    // recommended, and the diagnosis date drives the schedule.
    let today = fixed_today();
    let crosswalk = CodeCrosswalk::new();

    let mut a1c = ScreeningType::new(
        "Hemoglobin A1c".into(),
        Frequency {
            count: 6,
            unit: FrequencyUnit::Months,
        },
    );
    a1c.trigger_conditions
        .push(trigger(CodeSystem::Snomed, "44054006", "Type 2 diabetes mellitus"));
    let catalog = ScreeningTypeCatalog::new(vec![a1c]).unwrap();

    let patient = make_patient();
    let mut diabetes = PatientCondition::new(
        patient.id.clone(),
        "Type 2 diabetes mellitus".into(),
        today - Duration::days(900),
    );
    diabetes.system = Some(CodeSystem::Snomed);
    diabetes.code = Some("44054006".into());

    let results = evaluate_patient(
        &catalog,
        &crosswalk,
        &patient,
        &[diabetes],
        &[],
        today,
        &EngineConfig::default(),
    );

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, ScreeningStatus::Due);
    assert_eq!(result.evidence_kind, Some(EvidenceKind::Condition));
    assert_eq!(result.confidence, Some(1.0));
    assert!(result.matched_document_ids.is_empty());
}

#[test]
fn test_cross_system_code_still_triggers() {
    // Trigger is coded SNOMED; the chart carries the legacy ICD-9 code.
    let today = fixed_today();
    let crosswalk = CodeCrosswalk::new();

    let mut a1c = ScreeningType::new(
        "Hemoglobin A1c".into(),
        Frequency {
            count: 6,
            unit: FrequencyUnit::Months,
        },
    );
    a1c.trigger_conditions
        .push(trigger(CodeSystem::Snomed, "44054006", "Type 2 diabetes mellitus"));
    let catalog = ScreeningTypeCatalog::new(vec![a1c]).unwrap();

    let patient = make_patient();
    let mut legacy = PatientCondition::new(
        patient.id.clone(),
        "Diabetes mellitus type II".into(),
        today - Duration::days(30),
    );
    legacy.system = Some(CodeSystem::Icd9Cm);
    legacy.code = Some("250.00".into());

    let results = evaluate_patient(
        &catalog,
        &crosswalk,
        &patient,
        &[legacy],
        &[],
        today,
        &EngineConfig::default(),
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].confidence, Some(0.75));
    assert_eq!(results[0].evidence_kind, Some(EvidenceKind::Condition));
}

#[test]
fn test_gender_restriction_excludes_patient() {
    let today = fixed_today();
    let crosswalk = CodeCrosswalk::new();

    let mut mammogram = ScreeningType::new(
        "Mammogram".into(),
        Frequency {
            count: 1,
            unit: FrequencyUnit::Years,
        },
    );
    mammogram.gender = Some(Gender::Female);
    mammogram.keywords.push(Keyword::new("mammogram".into()));
    let catalog = ScreeningTypeCatalog::new(vec![mammogram]).unwrap();

    let mut patient = Patient::new("Bo".into());
    patient.age = Some(58);
    patient.gender = Some(Gender::Male);

    // Even with a matching document on file, the type is not evaluated.
    let mut doc = Document::new(
        patient.id.clone(),
        "imaging_report".into(),
        "mammogram.pdf".into(),
        today - Duration::days(30),
    );
    doc.content = "mammogram".into();

    let results = evaluate_patient(
        &catalog,
        &crosswalk,
        &patient,
        &[],
        &[doc],
        today,
        &EngineConfig::default(),
    );

    assert!(results.is_empty());
}

#[test]
fn test_same_day_tie_prefers_condition() {
    let today = fixed_today();
    let crosswalk = CodeCrosswalk::new();
    let evidence_date = today - Duration::days(90);

    let mut ty = make_type(1, FrequencyUnit::Years);
    ty.trigger_conditions
        .push(trigger(CodeSystem::Icd10Cm, "Z80.0", "FH colon cancer"));
    let catalog = ScreeningTypeCatalog::new(vec![ty]).unwrap();

    let patient = make_patient();
    let mut fh = PatientCondition::new(
        patient.id.clone(),
        "Family history of colon cancer".into(),
        evidence_date,
    );
    fh.system = Some(CodeSystem::Icd10Cm);
    fh.code = Some("Z80.0".into());

    let doc = make_document(&patient.id, evidence_date);

    let results = evaluate_patient(
        &catalog,
        &crosswalk,
        &patient,
        &[fh],
        &[doc],
        today,
        &EngineConfig::default(),
    );

    assert_eq!(results.len(), 1);
    // The document still shows up in the matched list; the condition is
    // the evidence of record for the date tie.
    assert_eq!(results[0].evidence_kind, Some(EvidenceKind::Condition));
    assert_eq!(results[0].matched_document_ids.len(), 1);
}
