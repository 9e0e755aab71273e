//! Type-directed coercion of a single column.
//!
//! Each [`ColumnType`] maps to one pure conversion. Values that cannot be
//! converted become [`Cell::Missing`] instead of failing the column, so the
//! output always has exactly as many cells as the input.
//!
//! | Type    | Output cell                          |
//! |---------|--------------------------------------|
//! | Text    | `Cell::Text`                         |
//! | Numeric | `Cell::Number` (finite `f64`)        |
//! | Date    | `Cell::Text` holding `YYYY-MM-DD`    |

use chrono::NaiveDate;

use crate::{
    data::{Cell, excel_serial_to_date, parse_naive_date, parse_naive_datetime},
    schema::ColumnType,
};

pub fn coerce_column(values: Vec<Cell>, column_type: ColumnType) -> Vec<Cell> {
    values
        .into_iter()
        .map(|cell| coerce_cell(cell, column_type))
        .collect()
}

pub fn coerce_cell(cell: Cell, column_type: ColumnType) -> Cell {
    if cell.is_missing() {
        return Cell::Missing;
    }
    let coerced = match column_type {
        ColumnType::Text => Some(to_text(cell)),
        ColumnType::Numeric => to_number(&cell).map(Cell::Number),
        ColumnType::Date => to_date(&cell).map(|date| Cell::Text(format_iso_date(date))),
    };
    coerced.unwrap_or(Cell::Missing)
}

fn to_text(cell: Cell) -> Cell {
    match cell {
        Cell::Text(text) => Cell::Text(text),
        other => Cell::Text(other.as_display()),
    }
}

fn to_number(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(value) => *value,
        Cell::Integer(value) => *value as f64,
        Cell::Bool(flag) => f64::from(u8::from(*flag)),
        Cell::Text(text) => text.trim().parse::<f64>().ok()?,
        Cell::Missing | Cell::Date(_) | Cell::DateTime(_) => return None,
    };
    value.is_finite().then_some(value)
}

fn to_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(date) => Some(*date),
        Cell::DateTime(datetime) => Some(datetime.date()),
        Cell::Number(serial) => excel_serial_to_date(*serial),
        Cell::Integer(serial) => excel_serial_to_date(*serial as f64),
        Cell::Text(text) => parse_date_text(text.trim()),
        Cell::Missing | Cell::Bool(_) => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = parse_naive_date(text) {
        return Some(date);
    }
    if let Ok(datetime) = parse_naive_datetime(text) {
        return Some(datetime.date());
    }
    text.parse::<f64>().ok().and_then(excel_serial_to_date)
}

fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
