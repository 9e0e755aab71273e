use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::schema::ColumnType;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Consolidate spreadsheets sharing one layout into a typed SQLite table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge every sheet of the inputs into one SQLite table named DATA
    Consolidate(ConsolidateArgs),
    /// Detect the reference columns and write suggested column types to YAML
    Probe(ProbeArgs),
    /// Consolidate without exporting and print the first rows
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Spreadsheet files or directories (searched recursively), in processing order
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Character encoding of CSV/TSV inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Delimiter for CSV/TSV inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct TypeArgs {
    /// YAML file listing the type of each column
    #[arg(short = 't', long = "types")]
    pub types: Option<PathBuf>,
    /// Column type override of the form `NAME=Text|Numeric|Date`
    #[arg(long = "type", value_parser = parse_type_assignment, action = clap::ArgAction::Append)]
    pub overrides: Vec<(String, ColumnType)>,
}

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub types: TypeArgs,
    /// Destination SQLite database (replaced if it exists)
    #[arg(short = 'o', long = "output", default_value = "consolidated_data.db")]
    pub output: PathBuf,
    /// Print the first N consolidated rows before exporting
    #[arg(long, default_value_t = 0)]
    pub preview: usize,
    /// Write skipped inputs and reasons to this file (.json or .csv)
    #[arg(long = "skip-report")]
    pub skip_report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination YAML type file (printed to stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub types: TypeArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_type_assignment(value: &str) -> Result<(String, ColumnType), String> {
    let (name, token) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("Expected NAME=TYPE, got '{value}'"))?;
    if name.is_empty() {
        return Err("Column name cannot be empty".to_string());
    }
    let column_type = token.parse::<ColumnType>().map_err(|err| err.to_string())?;
    Ok((name.to_string(), column_type))
}
