use crate::domain::model::Record;
use crate::domain::table::{Cell, Table};
use serde_json::{Map, Value};
use std::collections::HashMap;

const SEPARATOR: char = '.';

/// 把紀錄攤平成表格：巢狀物件以 `.` 連接欄位名稱，陣列保留為原始值
///
/// Columns are the union of all flattened keys in first-seen order; a record
/// without a given key gets `Null` in that column.
pub fn flatten_records(records: &[Record]) -> Table {
    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<(usize, Value)>> = Vec::with_capacity(records.len());

    for record in records {
        let mut flat = Vec::new();
        flatten_into(&record.data, None, &mut flat);

        let row = flat
            .into_iter()
            .map(|(name, value)| {
                let position = *index.entry(name.clone()).or_insert_with(|| {
                    names.push(name);
                    names.len() - 1
                });
                (position, value)
            })
            .collect();
        rows.push(row);
    }

    let mut columns: Vec<Vec<Cell>> = vec![vec![Cell::Null; records.len()]; names.len()];
    for (row_idx, row) in rows.into_iter().enumerate() {
        for (position, value) in row {
            columns[position][row_idx] = Cell::from(value);
        }
    }

    let mut table = Table::new(records.len());
    for (name, values) in names.into_iter().zip(columns) {
        table.push_column(name, values);
    }
    table
}

fn flatten_into(map: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let name = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, SEPARATOR, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(inner, Some(&name), out),
            other => out.push((name, other.clone())),
        }
    }
}
