//! Spreadsheet decoding behind the [`WorkbookDecoder`] capability.
//!
//! The engine never touches file bytes. It hands an [`InputFile`] to a decoder
//! and receives one [`DecodedSheet`] per sheet. [`FileDecoder`] reads real files
//! (`calamine` for workbooks, `csv` for delimited text); [`MemoryDecoder`]
//! serves tables that were decoded elsewhere.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::{
    data::{Cell, RawTable, parse_naive_date, parse_naive_datetime},
    io_utils,
};

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv"];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported file format '{0}'")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Workbook(#[from] calamine::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("text is not valid {0}")]
    Encoding(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// One input unit. `id` is what provenance and skip reports show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub id: String,
    pub path: PathBuf,
}

impl InputFile {
    /// Identifies the file by its file name, without directories.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, path }
    }

    /// An input with no backing file, for decoders that serve in-memory tables.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            path: PathBuf::from(&id),
            id,
        }
    }
}

#[derive(Debug)]
pub struct DecodedSheet {
    pub name: String,
    pub table: Result<RawTable, DecodeError>,
}

pub trait WorkbookDecoder {
    /// Decodes every sheet of `file` in workbook order. An `Err` means the file
    /// as a whole could not be opened.
    fn decode(&self, file: &InputFile) -> Result<Vec<DecodedSheet>, DecodeError>;
}

/// Decodes files from disk, choosing the reader by extension.
#[derive(Debug, Clone, Copy)]
pub struct FileDecoder {
    encoding: &'static Encoding,
    delimiter: Option<u8>,
}

impl Default for FileDecoder {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            delimiter: None,
        }
    }
}

impl FileDecoder {
    pub fn new(encoding: &'static Encoding, delimiter: Option<u8>) -> Self {
        Self {
            encoding,
            delimiter,
        }
    }

    fn decode_workbook(&self, path: &Path) -> Result<Vec<DecodedSheet>, DecodeError> {
        let mut workbook = open_workbook_auto(path)?;
        let sheets = workbook
            .sheet_names()
            .into_iter()
            .map(|name| {
                let table = workbook
                    .worksheet_range(&name)
                    .map(|range| {
                        let mut rows = range.rows();
                        let headers = rows
                            .next()
                            .map(|header| header.iter().map(header_text).collect())
                            .unwrap_or_default();
                        let records = rows.map(|row| row.iter().map(workbook_cell).collect());
                        RawTable::from_rows(unique_headers(headers), records)
                    })
                    .map_err(DecodeError::from);
                DecodedSheet { name, table }
            })
            .collect();
        Ok(sheets)
    }

    fn decode_delimited(&self, path: &Path) -> Result<Vec<DecodedSheet>, DecodeError> {
        let delimiter = io_utils::resolve_input_delimiter(path, self.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::decode_record(reader.byte_headers()?, self.encoding)?;
        let mut records = Vec::new();
        for record in reader.byte_records() {
            let decoded = io_utils::decode_record(&record?, self.encoding)?;
            records.push(decoded.into_iter().map(Cell::Text).collect::<Vec<_>>());
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(vec![DecodedSheet {
            name,
            table: Ok(RawTable::from_rows(unique_headers(headers), records)),
        }])
    }
}

impl WorkbookDecoder for FileDecoder {
    fn decode(&self, file: &InputFile) -> Result<Vec<DecodedSheet>, DecodeError> {
        let extension = io_utils::lowercase_extension(&file.path);
        if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            self.decode_workbook(&file.path)
        } else if DELIMITED_EXTENSIONS.contains(&extension.as_str()) {
            self.decode_delimited(&file.path)
        } else {
            Err(DecodeError::UnsupportedFormat(extension))
        }
    }
}

/// Serves tables decoded by some other collaborator, keyed by file id.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    files: HashMap<String, Result<Vec<(String, RawTable)>, String>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, file_id: &str, sheet: &str, table: RawTable) -> Self {
        if let Ok(sheets) = self
            .files
            .entry(file_id.to_string())
            .or_insert_with(|| Ok(Vec::new()))
        {
            sheets.push((sheet.to_string(), table));
        }
        self
    }

    /// Makes every decode of `file_id` fail with `message`.
    pub fn with_failure(mut self, file_id: &str, message: &str) -> Self {
        self.files
            .insert(file_id.to_string(), Err(message.to_string()));
        self
    }
}

impl WorkbookDecoder for MemoryDecoder {
    fn decode(&self, file: &InputFile) -> Result<Vec<DecodedSheet>, DecodeError> {
        match self.files.get(&file.id) {
            Some(Ok(sheets)) => Ok(sheets
                .iter()
                .map(|(name, table)| DecodedSheet {
                    name: name.clone(),
                    table: Ok(table.clone()),
                })
                .collect()),
            Some(Err(message)) => Err(DecodeError::Other(message.clone())),
            None => Err(DecodeError::Other(format!("no such file '{}'", file.id))),
        }
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn workbook_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(value) => Cell::Integer(*value),
        Data::Float(value) => Cell::Number(*value),
        Data::Bool(value) => Cell::Bool(*value),
        Data::String(text) => Cell::Text(text.clone()),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) if value.is_datetime() => Cell::DateTime(datetime),
            _ => Cell::Number(value.as_f64()),
        },
        Data::DateTimeIso(text) => parse_naive_datetime(text)
            .map(Cell::DateTime)
            .or_else(|_| parse_naive_date(text).map(Cell::Date))
            .unwrap_or_else(|_| Cell::Text(text.clone())),
        Data::DurationIso(text) => Cell::Text(text.clone()),
    }
}

/// Names blank headers `Unnamed: <index>` and suffixes repeats with `.1`, `.2`, ...
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = if header.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
