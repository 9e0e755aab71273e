//! Sheet cleaning applied before schema validation.
//!
//! [`normalize_missing`] folds every empty-looking cell into [`Cell::Missing`];
//! [`trim_trailing_blank_rows`] then drops the run of fully missing rows at the
//! bottom of a sheet (formatted but unused spreadsheet rows).

use crate::data::{Cell, RawTable};

/// Placeholder tokens compared case-insensitively after trimming.
const MISSING_TOKENS: &[&str] = &["n/a", "na", "null", "none"];

pub fn is_missing_equivalent(cell: &Cell) -> bool {
    match cell {
        Cell::Missing => true,
        Cell::Number(value) => value.is_nan(),
        Cell::Text(text) => {
            let trimmed = text.trim();
            trimmed.is_empty()
                || MISSING_TOKENS
                    .iter()
                    .any(|token| trimmed.eq_ignore_ascii_case(token))
        }
        _ => false,
    }
}

pub fn normalize_cell(cell: Cell) -> Cell {
    if is_missing_equivalent(&cell) {
        Cell::Missing
    } else {
        cell
    }
}

pub fn normalize_missing(mut table: RawTable) -> RawTable {
    for column in table.columns_mut() {
        for cell in &mut column.values {
            *cell = normalize_cell(std::mem::take(cell));
        }
    }
    table
}

pub fn trim_trailing_blank_rows(mut table: RawTable) -> RawTable {
    let keep = (0..table.row_count())
        .rev()
        .find(|&row| {
            table
                .columns()
                .iter()
                .any(|column| !column.values[row].is_missing())
        })
        .map_or(0, |last| last + 1);
    table.truncate_rows(keep);
    table
}

/// Normalizes then trims, the order the engine relies on.
pub fn clean_sheet(table: RawTable) -> RawTable {
    trim_trailing_blank_rows(normalize_missing(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn single_column(values: Vec<Cell>) -> RawTable {
        RawTable::new(vec![Column::new("value", values)])
    }

    #[test]
    fn placeholder_tokens_become_missing() {
        for token in ["", "   ", "N/A", " na ", "NULL", "None", "n/A"] {
            assert_eq!(normalize_cell(Cell::text(token)), Cell::Missing, "{token:?}");
        }
        assert_eq!(normalize_cell(Cell::Number(f64::NAN)), Cell::Missing);
    }

    #[test]
    fn ordinary_values_pass_through_untouched() {
        assert_eq!(normalize_cell(Cell::text(" Ann ")), Cell::text(" Ann "));
        assert_eq!(normalize_cell(Cell::text("nan")), Cell::text("nan"));
        assert_eq!(normalize_cell(Cell::text("NAB")), Cell::text("NAB"));
        assert_eq!(normalize_cell(Cell::Number(0.0)), Cell::Number(0.0));
        assert_eq!(normalize_cell(Cell::Bool(false)), Cell::Bool(false));
    }

    #[test]
    fn trim_removes_only_the_trailing_run() {
        let table = single_column(vec![
            Cell::text("a"),
            Cell::Missing,
            Cell::text("b"),
            Cell::Missing,
            Cell::Missing,
        ]);
        let trimmed = trim_trailing_blank_rows(table);
        assert_eq!(
            trimmed.columns()[0].values,
            vec![Cell::text("a"), Cell::Missing, Cell::text("b")]
        );
    }

    #[test]
    fn trim_keeps_row_with_any_present_cell() {
        let table = RawTable::new(vec![
            Column::new("a", vec![Cell::text("x"), Cell::Missing]),
            Column::new("b", vec![Cell::Missing, Cell::Integer(0)]),
        ]);
        assert_eq!(trim_trailing_blank_rows(table).row_count(), 2);
    }

    #[test]
    fn fully_blank_sheet_keeps_columns_but_no_rows() {
        let table = clean_sheet(single_column(vec![Cell::text(" "), Cell::text("N/A")]));
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_names(), vec!["value".to_string()]);
        assert!(table.is_empty());
    }
}
