use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::Cell, engine::ConsolidatedTable, schema::ColumnType};

/// Renders the first `limit` rows of `table` as aligned plain text.
///
/// Numeric columns are right-aligned; missing cells render as blanks.
pub fn render_preview(table: &ConsolidatedTable, limit: usize) -> String {
    let headers = table
        .column_names()
        .iter()
        .map(|name| sanitize_cell(name).into_owned())
        .collect::<Vec<_>>();
    let rows = table
        .rows()
        .take(limit)
        .map(|row| row.into_iter().map(render_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let right_aligned = table
        .column_types()
        .iter()
        .map(|ty| *ty == ColumnType::Numeric)
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths, &[]));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &[]));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &right_aligned));
    }

    let remaining = table.row_count().saturating_sub(rows.len());
    if remaining > 0 {
        let _ = writeln!(output, "... {remaining} more row(s)");
    }
    output
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Missing => String::new(),
        other => sanitize_cell(&other.as_display()).into_owned(),
    }
}

fn format_row(values: &[String], widths: &[usize], right_aligned: &[bool]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            if right_aligned.get(idx).copied().unwrap_or(false) {
                format!("{value:>width$}")
            } else {
                format!("{value:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
