#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sheet_consolidator::data::{Cell, Column, RawTable};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }
}

/// Builds a text-only sheet from `(column, values)` pairs.
pub fn text_table(columns: &[(&str, &[&str])]) -> RawTable {
    RawTable::new(
        columns
            .iter()
            .map(|(name, values)| Column::new(*name, values.iter().map(|v| Cell::text(*v)).collect()))
            .collect(),
    )
}
