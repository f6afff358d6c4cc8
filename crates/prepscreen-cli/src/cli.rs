use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use prepscreen_core::{CodeSystem, ScreeningService, ScreeningType};
use tracing::warn;

use crate::seed;
use crate::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "prepscreen",
    about = "Screening recommendation engine over a local SQLite chart",
    version
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true, default_value = "prepscreen.db")]
    db: String,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute and persist screenings for every patient
    Sweep(SweepArgs),
    /// Print fresh recommendations for one patient without writing
    Evaluate(PatientArgs),
    /// Recompute and persist screenings for one patient
    Reconcile(PatientArgs),
    /// Report drift between stored rows and a fresh evaluation
    Audit(PatientArgs),
    /// Score a screening type's keywords against sample text
    TestKeywords(TestKeywordsArgs),
    /// See which screening types a coded condition would trigger
    MatchCondition(MatchConditionArgs),
    /// Import screening type definitions from a JSON file
    ImportCatalog(ImportCatalogArgs),
    /// Load a small demo catalog and patient, then reconcile them
    SeedDemo,
}

#[derive(Args, Debug)]
struct DateArg {
    /// Evaluate as of this date (YYYY-MM-DD) instead of today
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    date: DateArg,
}

#[derive(Args, Debug)]
struct PatientArgs {
    /// Patient id
    patient_id: String,

    #[command(flatten)]
    date: DateArg,
}

#[derive(Args, Debug)]
struct TestKeywordsArgs {
    /// Screening type id or name
    #[arg(long = "type")]
    screening_type: String,

    /// Sample text to score
    text: String,
}

#[derive(Args, Debug)]
struct MatchConditionArgs {
    /// Coding system: snomed, icd10cm, icd9cm or custom
    #[arg(long)]
    system: Option<String>,

    /// Condition code within the system
    #[arg(long)]
    code: Option<String>,

    /// Display name to fall back on when no code matches
    #[arg(long)]
    display: Option<String>,
}

#[derive(Args, Debug)]
struct ImportCatalogArgs {
    /// JSON file holding an array of screening type definitions
    path: PathBuf,
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log)?;

    let service = ScreeningService::open(&cli.db)
        .with_context(|| format!("opening database at {}", cli.db))?;

    match cli.command {
        Command::Sweep(args) => run_sweep(&service, args),
        Command::Evaluate(args) => run_evaluate(&service, args),
        Command::Reconcile(args) => run_reconcile(&service, args),
        Command::Audit(args) => run_audit(&service, args),
        Command::TestKeywords(args) => run_test_keywords(&service, args),
        Command::MatchCondition(args) => run_match_condition(&service, args),
        Command::ImportCatalog(args) => run_import_catalog(&service, args),
        Command::SeedDemo => seed::run(&service),
    }
}

fn today_or(date: &DateArg) -> NaiveDate {
    date.as_of.unwrap_or_else(|| Local::now().date_naive())
}

fn run_sweep(service: &ScreeningService, args: SweepArgs) -> Result<()> {
    // No signal wiring here; the flag exists for embedders that host
    // sweeps on a worker thread.
    let cancel = AtomicBool::new(false);
    let report = service.sweep(today_or(&args.date), &cancel)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.failures.is_empty() {
        bail!(
            "sweep finished with {} failed patients",
            report.failures.len()
        );
    }
    Ok(())
}

fn run_evaluate(service: &ScreeningService, args: PatientArgs) -> Result<()> {
    let results = service.evaluate_patient(&args.patient_id, today_or(&args.date))?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn run_reconcile(service: &ScreeningService, args: PatientArgs) -> Result<()> {
    let outcome = service.reconcile_patient(&args.patient_id, today_or(&args.date))?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run_audit(service: &ScreeningService, args: PatientArgs) -> Result<()> {
    let findings = service.audit_patient(&args.patient_id, today_or(&args.date))?;
    println!("{}", serde_json::to_string_pretty(&findings)?);
    Ok(())
}

fn run_test_keywords(service: &ScreeningService, args: TestKeywordsArgs) -> Result<()> {
    let ty = resolve_type(service, &args.screening_type)?;
    let preview = service.test_keyword_match(&ty.id, &args.text)?;
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn run_match_condition(service: &ScreeningService, args: MatchConditionArgs) -> Result<()> {
    if args.code.is_none() && args.display.is_none() {
        bail!("give at least one of --code or --display");
    }
    let system = args
        .system
        .as_deref()
        .map(|s| {
            CodeSystem::parse(s).ok_or_else(|| {
                anyhow::anyhow!("unknown coding system '{s}'; expected snomed, icd10cm, icd9cm or custom")
            })
        })
        .transpose()?;
    if args.code.is_some() && system.is_none() {
        warn!("--code given without --system; only the display name can match");
    }

    let matches =
        service.test_condition_match(system, args.code.as_deref(), args.display.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&matches)?);
    Ok(())
}

fn run_import_catalog(service: &ScreeningService, args: ImportCatalogArgs) -> Result<()> {
    let json = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let count = service.import_catalog_json(&json)?;
    println!("imported {count} screening types");
    Ok(())
}

fn resolve_type(service: &ScreeningService, key: &str) -> Result<ScreeningType> {
    if let Some(ty) = service.get_screening_type(key)? {
        return Ok(ty);
    }
    if let Some(ty) = service.get_screening_type_by_name(key)? {
        return Ok(ty);
    }
    bail!("no screening type with id or name '{key}'")
}
