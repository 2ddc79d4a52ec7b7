//! Applies a [`Schema`] to a [`Table`].

use crate::domain::schema::{ColumnType, Schema};
use crate::domain::table::{render_bool, render_float, Cell, Table};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Columns whose name contains this marker are always parsed as timestamps.
const DATE_MARKER: &str = "Date";

/// Casts every column that appears in both `table` and `schema`.
///
/// Unknown columns pass through untouched and schema entries missing from the
/// table are ignored.
pub fn coerce(mut table: Table, schema: &Schema) -> Result<Table> {
    for column in table.columns_mut() {
        let Some(declared) = schema.get(&column.name) else {
            continue;
        };
        let target = effective_type(&column.name, declared);
        let values = std::mem::take(&mut column.values);
        column.values = values
            .into_iter()
            .map(|cell| cast_cell(&column.name, cell, target))
            .collect::<Result<Vec<_>>>()?;
    }
    Ok(table)
}

fn effective_type(column: &str, declared: ColumnType) -> ColumnType {
    if column.contains(DATE_MARKER) {
        ColumnType::DateTime
    } else {
        declared
    }
}

/// Casts one cell. Null stays Null for every target type.
pub fn cast_cell(column: &str, cell: Cell, target: ColumnType) -> Result<Cell> {
    let value = match cell {
        Cell::Null => return Ok(Cell::Null),
        Cell::Raw(value) => value,
        typed => return recast_typed(column, typed, target),
    };

    let cast = match target {
        ColumnType::String => return Ok(to_text(value)),
        ColumnType::Int => to_int(&value),
        ColumnType::Float => to_float(&value),
        ColumnType::Bool => to_bool(&value),
        ColumnType::DateTime => to_timestamp(&value),
    };

    cast.ok_or_else(|| EtlError::TypeCoercion {
        column: column.to_string(),
        value: value.to_string(),
        target: target.to_string(),
    })
}

// 已經有型別的值（例如 unpivot 先轉過的欄位）只在目標不同時再轉一次
fn recast_typed(column: &str, cell: Cell, target: ColumnType) -> Result<Cell> {
    let already = matches!(
        (&cell, target),
        (Cell::Int(_), ColumnType::Int)
            | (Cell::Float(_), ColumnType::Float)
            | (Cell::Text(_), ColumnType::String)
            | (Cell::Bool(_), ColumnType::Bool)
            | (Cell::Timestamp(_), ColumnType::DateTime)
    );
    if already {
        return Ok(cell);
    }
    let raw = match cell {
        Cell::Int(v) => Value::from(v),
        Cell::Float(v) => Value::from(v),
        Cell::Text(s) => Value::String(s),
        Cell::Bool(b) => Value::Bool(b),
        Cell::Timestamp(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Cell::Null | Cell::Raw(_) => unreachable!("handled by cast_cell"),
    };
    cast_cell(column, Cell::Raw(raw), target)
}

fn to_int(value: &Value) -> Option<Cell> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Cell::Int(i))
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Cell::Int(f as i64))
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Cell::Null);
            }
            if let Ok(i) = s.parse::<i64>() {
                return Some(Cell::Int(i));
            }
            let f = s.parse::<f64>().ok()?;
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Cell::Int(f as i64))
        }
        Value::Bool(b) => Some(Cell::Int(i64::from(*b))),
        Value::Null => Some(Cell::Null),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn to_float(value: &Value) -> Option<Cell> {
    match value {
        Value::Number(n) => n.as_f64().map(Cell::Float),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Cell::Null);
            }
            s.parse::<f64>().ok().map(Cell::Float)
        }
        Value::Bool(b) => Some(Cell::Float(if *b { 1.0 } else { 0.0 })),
        Value::Null => Some(Cell::Null),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn to_text(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::String(s) => Cell::Text(s),
        Value::Bool(b) => Cell::Text(render_bool(b).to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => Cell::Text(render_float(f)),
            _ => Cell::Text(n.to_string()),
        },
        other => Cell::Text(other.to_string()),
    }
}

fn to_bool(value: &Value) -> Option<Cell> {
    match value {
        Value::Bool(b) => Some(Cell::Bool(*b)),
        Value::Number(n) => n.as_f64().map(|f| Cell::Bool(f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Some(Cell::Null),
            "true" | "1" | "yes" => Some(Cell::Bool(true)),
            "false" | "0" | "no" => Some(Cell::Bool(false)),
            _ => None,
        },
        Value::Null => Some(Cell::Null),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn to_timestamp(value: &Value) -> Option<Cell> {
    match value {
        Value::Null => Some(Cell::Null),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Cell::Null);
            }
            parse_utc_naive(s).map(Cell::Timestamp)
        }
        _ => None,
    }
}

/// Parses a timestamp, converts it to UTC and drops the offset.
/// Input without an offset is taken to already be UTC.
pub fn parse_utc_naive(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
