//! File-system helpers: input discovery, encodings and CSV plumbing.
//!
//! - **Discovery**: explicit files are kept as given; directories are walked
//!   recursively for spreadsheet extensions and the result is sorted so runs
//!   never depend on directory iteration order.
//! - **Encoding**: delimited inputs are decoded via `encoding_rs`, defaulting
//!   to UTF-8.
//! - **Delimiters**: `.tsv` reads tab-separated, everything else comma.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};

use crate::decode::{DELIMITED_EXTENSIONS, DecodeError, WORKBOOK_EXTENSIONS};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_supported_input(path: &Path) -> bool {
    let extension = lowercase_extension(path);
    WORKBOOK_EXTENSIONS.contains(&extension.as_str())
        || DELIMITED_EXTENSIONS.contains(&extension.as_str())
}

/// Expands `inputs` into the ordered list of files to consolidate.
///
/// Files named explicitly keep their position; each directory contributes its
/// supported files (recursively, sorted by path) in its place. Office lock files
/// (`~$name.xlsx`) are ignored.
pub fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let metadata =
            fs::metadata(input).with_context(|| format!("Reading input path {input:?}"))?;
        if metadata.is_dir() {
            let mut found = Vec::new();
            walk_directory(input, &mut found)?;
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("No spreadsheet files found in {inputs:?}");
    }
    Ok(files)
}

fn walk_directory(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Listing directory {dir:?}"))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Listing directory {dir:?}"))?
            .path();
        if path.is_dir() {
            walk_directory(&path, found)?;
        } else if is_supported_input(&path) && !is_lock_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("~$"))
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match lowercase_extension(path).as_str() {
        "tsv" => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> io::Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    Ok(csv::WriterBuilder::new().from_writer(BufWriter::new(file)))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, DecodeError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(DecodeError::Encoding(encoding.name()))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, DecodeError> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}
