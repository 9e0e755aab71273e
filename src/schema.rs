//! Column types, the reference schema, and header validation.
//!
//! This module owns the three-way [`ColumnType`] enum, the user-supplied
//! [`ColumnTypeSpec`] (loaded from YAML or built from `NAME=TYPE` overrides),
//! the run-scoped [`ReferenceSchema`], and [`validate`], which decides whether a
//! sheet's header row may join the consolidated table.
//!
//! ## Responsibilities
//!
//! - YAML type file loading and saving via `serde_yaml`
//! - Reference schema establishment (first non-empty sheet wins, exactly once)
//! - Position-by-position header comparison with a readable mismatch reason
//! - Keyword-based type suggestions for freshly discovered columns

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use itertools::{EitherOrBoth, Itertools};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the provenance column appended to every consolidated row.
pub const SOURCE_FILE_COLUMN: &str = "Source_File";

const DATE_KEYWORDS: &[&str] = &["date", "facture", "échéance", "dt", "time"];
const NUMERIC_KEYWORDS: &[&str] = &[
    "code", "montant", "prix", "qté", "taux", "total", "num", "id", "valeur", "quantity", "amount",
    "sum", "count",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    #[default]
    Text,
    Numeric,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "Text",
            ColumnType::Numeric => "Numeric",
            ColumnType::Date => "Date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["Text", "Numeric", "Date"]
    }

    /// Declared SQLite column type used by the exporter.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "REAL",
            ColumnType::Text | ColumnType::Date => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "text" | "string" | "str" => Ok(ColumnType::Text),
            "numeric" | "number" | "float" | "real" => Ok(ColumnType::Numeric),
            "date" => Ok(ColumnType::Date),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Column name to type mapping chosen before a run starts.
///
/// Entries keep their insertion order so saved files list columns the way the
/// reference sheet does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeSpec {
    #[serde(default)]
    pub columns: Vec<ColumnTypeEntry>,
}

impl ColumnTypeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.set(name, column_type);
        self
    }

    /// Inserts or replaces the type for `name`.
    pub fn set(&mut self, name: impl Into<String>, column_type: ColumnType) {
        let name = name.into();
        match self.columns.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.column_type = column_type,
            None => self.columns.push(ColumnTypeEntry { name, column_type }),
        }
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.column_type)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Applies `overrides` on top of this spec.
    pub fn merge(&mut self, overrides: &ColumnTypeSpec) {
        for entry in &overrides.columns {
            self.set(entry.name.clone(), entry.column_type);
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening type file {path:?}"))?;
        let reader = BufReader::new(file);
        let spec: ColumnTypeSpec =
            serde_yaml::from_reader(reader).context("Parsing column type YAML")?;
        if let Some(duplicate) = spec.columns.iter().map(|e| &e.name).duplicates().next() {
            return Err(anyhow!("Column '{duplicate}' is listed more than once"));
        }
        Ok(spec)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating type file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing column type YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing column types to YAML string")
    }
}

/// Where a run gets its column types from.
#[derive(Debug, Clone)]
pub enum TypePlan {
    /// Types fixed up front; reference columns without an entry fall back to Text.
    Explicit(ColumnTypeSpec),
    /// Keyword suggestions for the discovered reference, with user overrides applied.
    Suggested(ColumnTypeSpec),
}

impl Default for TypePlan {
    fn default() -> Self {
        TypePlan::Suggested(ColumnTypeSpec::default())
    }
}

impl TypePlan {
    /// Resolves one type per reference column, in reference order.
    pub fn resolve(&self, reference: &ReferenceSchema) -> Vec<ColumnType> {
        let (spec, fallback_to_suggestion) = match self {
            TypePlan::Explicit(spec) => (spec, false),
            TypePlan::Suggested(overrides) => (overrides, true),
        };
        for entry in &spec.columns {
            if reference.position(&entry.name).is_none() {
                warn!(
                    "Type for '{}' ignored: column is not part of the reference schema",
                    entry.name
                );
            }
        }
        reference
            .columns()
            .iter()
            .map(|name| match spec.get(name) {
                Some(column_type) => column_type,
                None if fallback_to_suggestion => suggest_column_type(name),
                None => {
                    warn!("No type given for column '{name}'; treating it as Text");
                    ColumnType::Text
                }
            })
            .collect()
    }
}

pub fn suggest_column_type(name: &str) -> ColumnType {
    let lowered = name.to_lowercase();
    if DATE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        ColumnType::Date
    } else if NUMERIC_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        ColumnType::Numeric
    } else {
        ColumnType::Text
    }
}

pub fn suggest_column_types(reference: &ReferenceSchema) -> ColumnTypeSpec {
    reference
        .columns()
        .iter()
        .fold(ColumnTypeSpec::new(), |spec, name| {
            spec.with(name.clone(), suggest_column_type(name))
        })
}

/// Ordered header every consolidated sheet must match. Never changes once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSchema {
    columns: Vec<String>,
}

impl ReferenceSchema {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The candidate became the reference schema for the run.
    EstablishedReference,
    Accepted,
    Rejected(String),
    /// Nothing to compare; the reference slot is left untouched.
    Skipped,
}

/// Compares `candidate` with the run's reference, establishing it when absent.
pub fn validate(candidate: &[String], reference: &mut Option<ReferenceSchema>) -> Validation {
    if candidate.is_empty() {
        return Validation::Skipped;
    }
    if candidate.iter().any(|name| name == SOURCE_FILE_COLUMN) {
        return Validation::Rejected(format!(
            "column '{SOURCE_FILE_COLUMN}' is reserved for provenance"
        ));
    }
    if let Some(existing) = reference.as_ref() {
        return match first_mismatch(existing.columns(), candidate) {
            Some(reason) => Validation::Rejected(reason),
            None => Validation::Accepted,
        };
    }
    *reference = Some(ReferenceSchema {
        columns: candidate.to_vec(),
    });
    Validation::EstablishedReference
}

fn first_mismatch(expected: &[String], found: &[String]) -> Option<String> {
    expected
        .iter()
        .zip_longest(found.iter())
        .enumerate()
        .find_map(|(idx, pair)| {
            let position = idx + 1;
            match pair {
                EitherOrBoth::Both(want, got) if want == got => None,
                EitherOrBoth::Both(want, got) => Some(format!(
                    "expected column '{want}' at position {position}, found '{got}'"
                )),
                EitherOrBoth::Left(want) => Some(format!(
                    "missing column '{want}' at position {position}"
                )),
                EitherOrBoth::Right(got) => Some(format!(
                    "unexpected extra column '{got}' at position {position}"
                )),
            }
        })
        .map(|detail| {
            format!(
                "column names/order mismatch: {detail} (expected {} column(s), found {})",
                expected.len(),
                found.len()
            )
        })
}
