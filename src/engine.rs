//! The consolidation engine.
//!
//! A [`ConsolidationRun`] owns all per-run state: the reference schema, the
//! resolved column types, the growing [`ConsolidatedTable`] and the
//! [`SkipReport`]. Each sheet of each input goes through
//! normalize → trim → validate → coerce → tag with its file id → append.
//!
//! Per-file problems never abort the run. They are recorded in the skip report
//! and processing moves on. Only a run where no sheet ever established a
//! reference schema ends in [`ConsolidateError::NoValidData`].

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    clean::clean_sheet,
    coerce::coerce_column,
    data::{Cell, RawTable},
    decode::{DecodeError, InputFile, WorkbookDecoder},
    schema::{ColumnType, ReferenceSchema, SOURCE_FILE_COLUMN, TypePlan, Validation, validate},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEntry {
    pub file: String,
    pub reason: String,
}

impl fmt::Display for SkipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.reason)
    }
}

/// Ordered record of every input that did not make it into the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SkipReport {
    entries: Vec<SkipEntry>,
}

impl SkipReport {
    pub fn record(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        let entry = SkipEntry {
            file: file.into(),
            reason: reason.into(),
        };
        warn!("Skipping {entry}");
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[SkipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Typed, provenance-tagged rows of every accepted sheet, stored by column.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedTable {
    names: Vec<String>,
    types: Vec<ColumnType>,
    columns: Vec<Vec<Cell>>,
}

impl ConsolidatedTable {
    fn new(reference: &ReferenceSchema, types: Vec<ColumnType>) -> Self {
        let mut names = reference.columns().to_vec();
        names.push(SOURCE_FILE_COLUMN.to_string());
        let mut types = types;
        types.push(ColumnType::Text);
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            types,
            columns,
        }
    }

    /// Column names, ending with the provenance column.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.columns[idx])
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.row_count()).map(|idx| self.columns.iter().map(|c| &c[idx]).collect())
    }

    fn append(&mut self, typed: Vec<Vec<Cell>>, source: &str) {
        let rows = typed.first().map_or(0, Vec::len);
        let (data, provenance) = self.columns.split_at_mut(typed.len());
        for (target, values) in data.iter_mut().zip(typed) {
            target.extend(values);
        }
        if let Some(provenance) = provenance.first_mut() {
            provenance.extend(std::iter::repeat_n(Cell::text(source), rows));
        }
    }
}

#[derive(Debug)]
pub struct Consolidation {
    pub reference: ReferenceSchema,
    pub table: ConsolidatedTable,
    pub skipped: SkipReport,
}

#[derive(Debug, Error)]
pub enum ConsolidateError {
    /// No sheet established a reference schema. Carries what was skipped.
    #[error("No valid data found in any of the {files} input file(s)")]
    NoValidData { files: usize, skipped: SkipReport },
}

/// Run-scoped consolidation state.
pub struct ConsolidationRun<'a> {
    decoder: &'a dyn WorkbookDecoder,
    plan: &'a TypePlan,
    reference: Option<ReferenceSchema>,
    types: Vec<ColumnType>,
    table: Option<ConsolidatedTable>,
    skipped: SkipReport,
    files_seen: usize,
}

impl<'a> ConsolidationRun<'a> {
    pub fn new(decoder: &'a dyn WorkbookDecoder, plan: &'a TypePlan) -> Self {
        Self {
            decoder,
            plan,
            reference: None,
            types: Vec::new(),
            table: None,
            skipped: SkipReport::default(),
            files_seen: 0,
        }
    }

    /// Decodes `file` and appends each of its acceptable sheets.
    pub fn process_file(&mut self, file: &InputFile) {
        self.files_seen += 1;
        let sheets = match self.decoder.decode(file) {
            Ok(sheets) => sheets,
            Err(err) => {
                self.skipped.record(&file.id, unreadable(&err));
                return;
            }
        };
        let multi_sheet = sheets.len() > 1;
        let mut appended = 0usize;
        for sheet in sheets {
            let label = if multi_sheet {
                format!("sheet '{}' ", sheet.name)
            } else {
                String::new()
            };
            match sheet.table {
                Ok(table) => {
                    appended += self.process_sheet(file, &sheet.name, &label, table);
                }
                Err(err) => {
                    self.skipped
                        .record(&file.id, format!("{label}{}", unreadable(&err)));
                }
            }
        }
        info!("Processed {} ({appended} row(s) appended)", file.id);
    }

    fn process_sheet(
        &mut self,
        file: &InputFile,
        sheet: &str,
        label: &str,
        table: RawTable,
    ) -> usize {
        let table = clean_sheet(table);
        if table.is_empty() {
            debug!("Sheet '{sheet}' of {} is empty after cleaning; skipped", file.id);
            return 0;
        }
        match validate(&table.column_names(), &mut self.reference) {
            Validation::Skipped => return 0,
            Validation::Rejected(reason) => {
                self.skipped.record(&file.id, format!("{label}{reason}"));
                return 0;
            }
            Validation::EstablishedReference => {
                if let Some(reference) = &self.reference {
                    info!(
                        "Reference schema established from {} sheet '{sheet}': {} column(s)",
                        file.id,
                        reference.len()
                    );
                    self.types = self.plan.resolve(reference);
                    self.table = Some(ConsolidatedTable::new(reference, self.types.clone()));
                }
            }
            Validation::Accepted => {}
        }
        let rows = table.row_count();
        let typed = table
            .into_columns()
            .into_iter()
            .zip(&self.types)
            .map(|(column, column_type)| coerce_column(column.values, *column_type))
            .collect::<Vec<_>>();
        if let Some(accumulated) = self.table.as_mut() {
            accumulated.append(typed, &file.id);
        }
        rows
    }

    pub fn finish(self) -> Result<Consolidation, ConsolidateError> {
        match (self.reference, self.table) {
            (Some(reference), Some(table)) => {
                info!(
                    "Consolidated {} row(s) from {} file(s); {} skipped",
                    table.row_count(),
                    self.files_seen,
                    self.skipped.len()
                );
                Ok(Consolidation {
                    reference,
                    table,
                    skipped: self.skipped,
                })
            }
            _ => Err(ConsolidateError::NoValidData {
                files: self.files_seen,
                skipped: self.skipped,
            }),
        }
    }
}

fn unreadable(err: &DecodeError) -> String {
    format!("unreadable: {err}")
}

/// Consolidates `files` in the order given.
pub fn consolidate(
    files: &[InputFile],
    decoder: &dyn WorkbookDecoder,
    plan: &TypePlan,
) -> Result<Consolidation, ConsolidateError> {
    let mut run = ConsolidationRun::new(decoder, plan);
    for file in files {
        run.process_file(file);
    }
    run.finish()
}
