mod common;

use std::path::{Path, PathBuf};

use common::{TestWorkspace, text_table};
use sheet_consolidator::{
    data::{Cell, Column, RawTable},
    decode::{FileDecoder, InputFile, MemoryDecoder},
    engine::{ConsolidateError, consolidate},
    export::{export_sqlite, load_table},
    schema::{ColumnType, ColumnTypeSpec, SOURCE_FILE_COLUMN, TypePlan},
};

fn name_amount_plan() -> TypePlan {
    TypePlan::Explicit(
        ColumnTypeSpec::new()
            .with("Name", ColumnType::Text)
            .with("Amount", ColumnType::Numeric),
    )
}

#[test]
fn extra_column_file_is_skipped_and_bad_amount_becomes_missing() {
    let decoder = MemoryDecoder::new()
        .with_sheet(
            "file1.xlsx",
            "Sheet1",
            text_table(&[("Name", &["Ann", "Bob"]), ("Amount", &["10", "x"])]),
        )
        .with_sheet(
            "file2.xlsx",
            "Sheet1",
            text_table(&[
                ("Name", &["Cy"]),
                ("Amount", &["3"]),
                ("Extra", &["?"]),
            ]),
        );
    let files = [InputFile::named("file1.xlsx"), InputFile::named("file2.xlsx")];

    let result = consolidate(&files, &decoder, &name_amount_plan()).expect("consolidated");

    assert_eq!(
        result.table.column_names(),
        &["Name", "Amount", SOURCE_FILE_COLUMN]
    );
    assert_eq!(result.table.row_count(), 2);
    assert_eq!(
        result.table.column("Amount").unwrap(),
        &[Cell::Number(10.0), Cell::Missing]
    );
    assert_eq!(result.skipped.len(), 1);
    let entry = &result.skipped.entries()[0];
    assert_eq!(entry.file, "file2.xlsx");
    assert!(entry.reason.contains("unexpected extra column 'Extra'"), "{}", entry.reason);
}

#[test]
fn row_count_is_sum_of_accepted_sheets_after_trimming() {
    let decoder = MemoryDecoder::new()
        .with_sheet("a.xlsx", "S1", text_table(&[("Name", &["a1", "a2", "", ""])]))
        .with_sheet("a.xlsx", "S2", text_table(&[("Name", &["a3", "", "a4"])]))
        .with_sheet("b.xlsx", "S1", text_table(&[("Other", &["b1"])]))
        .with_sheet("c.xlsx", "S1", text_table(&[("Name", &["NULL", "c1", "none"])]));
    let files = ["a.xlsx", "b.xlsx", "c.xlsx"].map(InputFile::named);

    let result = consolidate(&files, &decoder, &TypePlan::default()).expect("consolidated");

    assert_eq!(result.table.row_count(), 2 + 3 + 2);
    let provenance = result.table.column(SOURCE_FILE_COLUMN).unwrap();
    assert!(provenance.iter().all(|cell| !cell.is_missing()));
    assert_eq!(
        provenance,
        &["a.xlsx", "a.xlsx", "a.xlsx", "a.xlsx", "a.xlsx", "c.xlsx", "c.xlsx"].map(Cell::text)
    );
}

#[test]
fn identical_inputs_give_identical_output() {
    let build = || {
        MemoryDecoder::new()
            .with_sheet("x.xlsx", "S", text_table(&[("Due date", &["2024-03-01", "45000"])]))
            .with_sheet("y.xlsx", "S", text_table(&[("Due date", &["oops"])]))
    };
    let files = [InputFile::named("x.xlsx"), InputFile::named("y.xlsx")];
    let first = consolidate(&files, &build(), &TypePlan::default()).expect("first run");
    let second = consolidate(&files, &build(), &TypePlan::default()).expect("second run");
    assert_eq!(first.table, second.table);
    assert_eq!(first.skipped, second.skipped);
    assert_eq!(
        first.table.column("Due date").unwrap(),
        &[Cell::text("2024-03-01"), Cell::text("2023-03-15"), Cell::Missing]
    );
}

#[test]
fn only_blank_sheets_yield_no_valid_data() {
    let decoder = MemoryDecoder::new()
        .with_sheet("a.xlsx", "S", text_table(&[("Name", &["", "  "])]))
        .with_sheet("b.xlsx", "S", RawTable::default());
    let files = [InputFile::named("a.xlsx"), InputFile::named("b.xlsx")];
    let err = consolidate(&files, &decoder, &TypePlan::default()).expect_err("no data");
    let ConsolidateError::NoValidData { files, skipped } = err;
    assert_eq!(files, 2);
    assert!(skipped.is_empty());
}

#[test]
fn exported_database_round_trips_with_nulls() {
    let decoder = MemoryDecoder::new().with_sheet(
        "file1.xlsx",
        "Sheet1",
        RawTable::new(vec![
            Column::new("Name", vec![Cell::text("Ann"), Cell::Missing]),
            Column::new("Amount", vec![Cell::Number(10.25), Cell::text("x")]),
            Column::new("Paid on", vec![Cell::Number(45000.0), Cell::text("2024-03-01")]),
        ]),
    );
    let plan = TypePlan::Explicit(
        ColumnTypeSpec::new()
            .with("Name", ColumnType::Text)
            .with("Amount", ColumnType::Numeric)
            .with("Paid on", ColumnType::Date),
    );
    let result =
        consolidate(&[InputFile::named("file1.xlsx")], &decoder, &plan).expect("consolidated");

    let workspace = TestWorkspace::new();
    let db_path = workspace.path().join("out.db");
    let written = export_sqlite(&result.table, &db_path).expect("export");
    assert_eq!(written, 2);

    let stored = load_table(&db_path).expect("read back");
    assert_eq!(stored.columns, result.table.column_names());
    assert_eq!(stored.declared_types, vec!["TEXT", "REAL", "TEXT", "TEXT"]);
    let expected = result
        .table
        .rows()
        .map(|row| row.into_iter().cloned().collect::<Vec<_>>())
        .collect::<Vec<_>>();
    assert_eq!(stored.rows, expected);
    assert_eq!(stored.rows[1][0], Cell::Missing);
    assert_eq!(stored.rows[0][2], Cell::text("2023-03-15"));
}

#[test]
fn export_replaces_existing_file_and_leaves_no_staging_files() {
    let workspace = TestWorkspace::new();
    let existing = workspace.write("out.db", "stale bytes");
    let decoder =
        MemoryDecoder::new().with_sheet("f.xlsx", "S", text_table(&[("Name", &["Ann"])]));
    let result = consolidate(&[InputFile::named("f.xlsx")], &decoder, &TypePlan::default())
        .expect("consolidated");

    export_sqlite(&result.table, &existing).expect("export");

    assert_eq!(load_table(&existing).expect("read back").rows.len(), 1);
    let leftovers = std::fs::read_dir(workspace.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn export_into_missing_directory_fails_without_artifact() {
    let workspace = TestWorkspace::new();
    let target = workspace.path().join("nope").join("out.db");
    let decoder =
        MemoryDecoder::new().with_sheet("f.xlsx", "S", text_table(&[("Name", &["Ann"])]));
    let result = consolidate(&[InputFile::named("f.xlsx")], &decoder, &TypePlan::default())
        .expect("consolidated");

    assert!(export_sqlite(&result.table, &target).is_err());
    assert!(!target.exists());
}

#[test]
fn csv_files_on_disk_consolidate_through_file_decoder() {
    let workspace = TestWorkspace::new();
    let jan = workspace.write("jan.csv", "Name,Amount\nAnn,10\nBob,N/A\n,\n");
    let feb = workspace.write("feb.csv", "Amount,Name\n1,Cy\n");
    let corrupt = workspace.write("mar.xlsx", "not a workbook");
    let files = [jan, feb, corrupt].map(InputFile::from_path);

    let result = consolidate(&files, &FileDecoder::default(), &name_amount_plan())
        .expect("consolidated");

    assert_eq!(result.table.row_count(), 2);
    assert_eq!(
        result.table.column("Amount").unwrap(),
        &[Cell::Number(10.0), Cell::Missing]
    );
    let skipped = result
        .skipped
        .entries()
        .iter()
        .map(|e| e.file.as_str())
        .collect::<Vec<_>>();
    assert_eq!(skipped, vec!["feb.csv", "mar.xlsx"]);
    assert!(result.skipped.entries()[1].reason.starts_with("unreadable"));
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn workbook_sheets_consolidate_to_iso_dates_and_numbers() {
    let files = [InputFile::from_path(fixture("invoices.xlsx"))];
    let plan = TypePlan::Explicit(
        ColumnTypeSpec::new()
            .with("Client", ColumnType::Text)
            .with("Date Facture", ColumnType::Date)
            .with("Montant", ColumnType::Numeric),
    );

    let result = consolidate(&files, &FileDecoder::default(), &plan).expect("consolidated");

    assert_eq!(
        result.table.column_names(),
        &["Client", "Date Facture", "Montant", SOURCE_FILE_COLUMN]
    );
    assert_eq!(
        result.table.column("Client").unwrap(),
        &["ACME", "Globex", "Initech"].map(Cell::text)
    );
    assert_eq!(
        result.table.column("Date Facture").unwrap(),
        &["2023-03-15", "2023-03-16", "2023-04-15"].map(Cell::text)
    );
    assert_eq!(
        result.table.column("Montant").unwrap(),
        &[Cell::Number(10.5), Cell::Missing, Cell::Number(7.5)]
    );
    assert!(
        result
            .table
            .column(SOURCE_FILE_COLUMN)
            .unwrap()
            .iter()
            .all(|cell| *cell == Cell::text("invoices.xlsx"))
    );

    assert_eq!(result.skipped.len(), 1);
    let entry = &result.skipped.entries()[0];
    assert_eq!(entry.file, "invoices.xlsx");
    assert!(
        entry
            .reason
            .starts_with("sheet 'Notes' column names/order mismatch"),
        "{}",
        entry.reason
    );
}
