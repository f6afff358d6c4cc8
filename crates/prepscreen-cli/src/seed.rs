//! Demo seed: a small catalog plus one patient with a realistic chart.

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use prepscreen_core::catalog::trigger;
use prepscreen_core::{
    CodeSystem, Document, Frequency, FrequencyUnit, Gender, Keyword, Patient, PatientCondition,
    ScreeningService, ScreeningType,
};
use tracing::info;

pub(crate) fn run(service: &ScreeningService) -> Result<()> {
    let today = Local::now().date_naive();

    // By-name import keeps repeated seeding idempotent for the catalog.
    let count = service.import_screening_types(&demo_catalog())?;
    info!(count, "seeded demo catalog");

    let patient = demo_patient(service, today)?;
    let outcome = service.reconcile_patient(&patient.id, today)?;
    info!(
        patient_id = %patient.id,
        created = outcome.created,
        "seeded and reconciled demo patient"
    );

    let results = service.evaluate_patient(&patient.id, today)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    println!("demo patient id: {}", patient.id);
    Ok(())
}

fn keyword(text: &str, weight: f64, exact: bool) -> Keyword {
    let mut kw = Keyword::new(text.into());
    kw.weight = weight;
    kw.exact_match = exact;
    kw
}

fn demo_catalog() -> Vec<ScreeningType> {
    let mut mammogram = ScreeningType::new(
        "Mammogram".into(),
        Frequency {
            count: 1,
            unit: FrequencyUnit::Years,
        },
    );
    mammogram.description = Some("Bilateral screening mammography".into());
    mammogram.min_age = Some(40);
    mammogram.max_age = Some(74);
    mammogram.gender = Some(Gender::Female);
    mammogram.keywords = vec![
        keyword("mammogram", 3.0, false),
        keyword("mammography", 3.0, false),
        keyword("birads", 2.0, false),
        keyword("bilateral screening", 1.0, false),
    ];
    mammogram.trigger_conditions = vec![trigger(
        CodeSystem::Icd10Cm,
        "Z80.3",
        "Family history of malignant neoplasm of breast",
    )];

    let mut colonoscopy = ScreeningType::new(
        "Colonoscopy".into(),
        Frequency {
            count: 10,
            unit: FrequencyUnit::Years,
        },
    );
    colonoscopy.min_age = Some(45);
    colonoscopy.max_age = Some(75);
    colonoscopy.keywords = vec![
        keyword("colonoscopy", 3.0, false),
        keyword("cologuard", 2.0, false),
        keyword("polypectomy", 1.0, false),
    ];
    colonoscopy.trigger_conditions = vec![trigger(
        CodeSystem::Icd10Cm,
        "Z80.0",
        "Family history of malignant neoplasm of digestive organs",
    )];

    let mut a1c = ScreeningType::new(
        "Hemoglobin A1c".into(),
        Frequency {
            count: 6,
            unit: FrequencyUnit::Months,
        },
    );
    a1c.description = Some("Glycemic control check for diabetics".into());
    a1c.keywords = vec![
        keyword("a1c", 3.0, true),
        keyword("hba1c", 3.0, true),
        keyword("hemoglobin a1c", 2.0, false),
        keyword("glycated hemoglobin", 1.0, false),
    ];
    a1c.trigger_conditions = vec![
        trigger(CodeSystem::Snomed, "44054006", "Type 2 diabetes mellitus"),
        trigger(
            CodeSystem::Icd10Cm,
            "E11.9",
            "Type 2 diabetes mellitus without complications",
        ),
    ];

    let mut lipid = ScreeningType::new(
        "Lipid Panel".into(),
        Frequency {
            count: 5,
            unit: FrequencyUnit::Years,
        },
    );
    lipid.min_age = Some(40);
    lipid.keywords = vec![
        keyword("lipid panel", 3.0, false),
        keyword("ldl", 2.0, true),
        keyword("cholesterol", 1.0, false),
    ];

    vec![mammogram, colonoscopy, a1c, lipid]
}

fn demo_patient(service: &ScreeningService, today: NaiveDate) -> Result<Patient> {
    let mut patient = Patient::new("Dana Demo".into());
    patient.age = Some(58);
    patient.gender = Some(Gender::Female);
    service.upsert_patient(&patient)?;

    let mut diabetes = PatientCondition::new(
        patient.id.clone(),
        "Type 2 diabetes mellitus".into(),
        today - Duration::days(900),
    );
    diabetes.system = Some(CodeSystem::Snomed);
    diabetes.code = Some("44054006".into());
    service.add_condition(&diabetes)?;

    // A recent mammogram report and a stale A1c lab, so the demo shows
    // complete, due and due-from-condition rows side by side.
    let mut mammo_report = Document::new(
        patient.id.clone(),
        "imaging_report".into(),
        "mammogram_report.pdf".into(),
        today - Duration::days(100),
    );
    mammo_report.content =
        "Bilateral screening mammography performed. BIRADS 1, negative exam.".into();
    mammo_report.ocr_processed = true;
    mammo_report.ocr_confidence = Some(0.95);
    service.add_document(&mammo_report)?;

    let mut a1c_lab = Document::new(
        patient.id.clone(),
        "lab_report".into(),
        "a1c_result.pdf".into(),
        today - Duration::days(420),
    );
    a1c_lab.content = "Hemoglobin A1c: 7.2% (glycated hemoglobin)".into();
    a1c_lab.ocr_processed = true;
    a1c_lab.ocr_confidence = Some(0.9);
    service.add_document(&a1c_lab)?;

    Ok(patient)
}
