pub mod clean;
pub mod cli;
pub mod coerce;
pub mod data;
pub mod decode;
pub mod engine;
pub mod export;
pub mod io_utils;
pub mod schema;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    clean::clean_sheet,
    cli::{Cli, Commands, InputArgs, TypeArgs},
    decode::{FileDecoder, InputFile, WorkbookDecoder},
    engine::{ConsolidateError, Consolidation, SkipReport, consolidate},
    schema::{ColumnTypeSpec, TypePlan, Validation, suggest_column_types, validate},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_consolidator", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Consolidate(args) => handle_consolidate(&args),
        Commands::Probe(args) => handle_probe(&args),
        Commands::Preview(args) => handle_preview(&args),
    }
}

fn handle_consolidate(args: &cli::ConsolidateArgs) -> Result<()> {
    let consolidation = match run_consolidation(&args.input, &args.types)? {
        Ok(consolidation) => consolidation,
        Err(err) => {
            let ConsolidateError::NoValidData { skipped, .. } = &err;
            if let Some(path) = &args.skip_report {
                write_skip_report(skipped, path)
                    .with_context(|| format!("Writing skip report to {path:?}"))?;
            }
            return Err(err.into());
        }
    };
    if args.preview > 0 {
        print!("{}", table::render_preview(&consolidation.table, args.preview));
    }
    if let Some(path) = &args.skip_report {
        write_skip_report(&consolidation.skipped, path)
            .with_context(|| format!("Writing skip report to {path:?}"))?;
    }
    export::export_sqlite(&consolidation.table, &args.output)
        .with_context(|| format!("Exporting consolidated data to {:?}", args.output))?;
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let consolidation = run_consolidation(&args.input, &args.types)??;
    print!("{}", table::render_preview(&consolidation.table, args.rows));
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let decoder = build_decoder(&args.input)?;
    let files = discover(&args.input)?;
    for file in &files {
        let Ok(sheets) = decoder.decode(file) else {
            warn!("Could not read {} while probing; trying the next file", file.id);
            continue;
        };
        for sheet in sheets {
            let Ok(table) = sheet.table else {
                continue;
            };
            let table = clean_sheet(table);
            if table.is_empty() {
                continue;
            }
            let mut reference = None;
            if validate(&table.column_names(), &mut reference) != Validation::EstablishedReference {
                continue;
            }
            let Some(reference) = reference else {
                continue;
            };
            info!(
                "Columns taken from {} sheet '{}' ({} column(s))",
                file.id,
                sheet.name,
                reference.len()
            );
            let suggested = suggest_column_types(&reference);
            match &args.output {
                Some(path) => {
                    suggested
                        .save(path)
                        .with_context(|| format!("Writing column types to {path:?}"))?;
                    info!("Suggested types written to {path:?}");
                }
                None => print!("{}", suggested.to_yaml_string()?),
            }
            return Ok(());
        }
    }
    Err(anyhow!(
        "No valid data found: none of the {} input file(s) has a non-empty sheet",
        files.len()
    ))
}

/// Setup failures are the outer error; the inner result is the run outcome.
fn run_consolidation(
    input: &InputArgs,
    types: &TypeArgs,
) -> Result<Result<Consolidation, ConsolidateError>> {
    let decoder = build_decoder(input)?;
    let files = discover(input)?;
    let plan = build_type_plan(types)?;
    info!("Consolidating {} file(s)", files.len());
    Ok(consolidate(&files, &decoder, &plan))
}

fn build_decoder(input: &InputArgs) -> Result<FileDecoder> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    Ok(FileDecoder::new(encoding, input.delimiter))
}

fn discover(input: &InputArgs) -> Result<Vec<InputFile>> {
    Ok(io_utils::discover_inputs(&input.inputs)?
        .into_iter()
        .map(InputFile::from_path)
        .collect())
}

fn build_type_plan(args: &TypeArgs) -> Result<TypePlan> {
    let overrides = args
        .overrides
        .iter()
        .fold(ColumnTypeSpec::new(), |spec, (name, column_type)| {
            spec.with(name.clone(), *column_type)
        });
    match &args.types {
        Some(path) => {
            let mut spec = ColumnTypeSpec::load(path)
                .with_context(|| format!("Loading column types from {path:?}"))?;
            spec.merge(&overrides);
            Ok(TypePlan::Explicit(spec))
        }
        None => Ok(TypePlan::Suggested(overrides)),
    }
}

fn write_skip_report(report: &SkipReport, path: &Path) -> Result<()> {
    if io_utils::lowercase_extension(path) == "json" {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, report).context("Writing skip report JSON")?;
    } else {
        let mut writer = io_utils::open_csv_writer(path)?;
        writer.write_record(["file", "reason"])?;
        for entry in report.entries() {
            writer.write_record([entry.file.as_str(), entry.reason.as_str()])?;
        }
        writer.flush()?;
    }
    info!("Recorded {} skipped input(s) in {path:?}", report.len());
    Ok(())
}
