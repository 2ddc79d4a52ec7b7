//! Pivots the dimension tags attached to transactions into wide columns.
//!
//! A transaction carries `Dimensions.Dimension`, a list of tags such as
//! `{"Type": "Project", "Name": "Website", "Value": "P-12", "Percent": 0.5}`.
//! Every `(field, Type)` pair across the dataset becomes one column named
//! `Type + field` (`ProjectValue`, `ProjectPercent`, ...), keyed by
//! `(ClientName, Id)` of the owning transaction.

use crate::core::coercion::cast_cell;
use crate::domain::model::{Record, CLIENT_NAME_FIELD};
use crate::domain::outcome::SchemaMismatch;
use crate::domain::schema::Schema;
use crate::domain::table::{Cell, Table};
use crate::utils::error::Result;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

pub const DIMENSIONS_FIELD: &str = "Dimensions";
pub const DIMENSION_LIST_FIELD: &str = "Dimension";

const ID_FIELD: &str = "Id";
const TYPE_FIELD: &str = "Type";

type RowKey = (String, String);

/// Pivoted dimension columns plus the `(ClientName, Id)` index of each row.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionTable {
    index: HashMap<RowKey, usize>,
    table: Table,
}

impl DimensionTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn row_for(&self, client_name: &str, id: &str) -> Option<usize> {
        self.index
            .get(&(client_name.to_string(), id.to_string()))
            .copied()
    }

    /// Left-joins the dimension columns onto `flat` by `(ClientName, Id)`.
    /// Every row of `flat` is kept; rows without a match get `Null`.
    /// A dimension column whose name is already taken gets a `Dimension` suffix.
    pub fn left_join_onto(&self, flat: &mut Table) {
        let keys: Vec<Option<usize>> = (0..flat.row_count())
            .map(|row| {
                let client = flat.cell(CLIENT_NAME_FIELD, row).map(Cell::render)?;
                let id = flat.cell(ID_FIELD, row).map(Cell::render)?;
                self.row_for(&client, &id)
            })
            .collect();

        for column in self.table.columns() {
            let values = keys
                .iter()
                .map(|matched| match matched {
                    Some(dim_row) => column.values[*dim_row].clone(),
                    None => Cell::Null,
                })
                .collect();
            let mut name = column.name.clone();
            while flat.column(&name).is_some() {
                name.push_str("Dimension");
            }
            if name != column.name {
                tracing::warn!(
                    "⚠️ Dimension column {} collides with a source column, writing it as {}",
                    column.name,
                    name
                );
            }
            flat.push_column(name, values);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnpivotOutcome {
    /// No record carries any tag; transactions go on without dimension columns.
    NoDimensions,
    Pivoted(DimensionTable),
    Mismatch(SchemaMismatch),
}

/// 取出紀錄中的 dimension tags；接受陣列、單一物件、null 或缺少欄位
fn dimension_tags(record: &Record) -> Vec<&Map<String, Value>> {
    let list = record
        .get(DIMENSIONS_FIELD)
        .and_then(Value::as_object)
        .and_then(|dims| dims.get(DIMENSION_LIST_FIELD));

    match list {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(single)) => vec![single],
        _ => Vec::new(),
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn present(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

/// Total number of dimension tags across `records`.
pub fn dimension_count(records: &[Record]) -> usize {
    records.iter().map(|r| dimension_tags(r).len()).sum()
}

/// 檢查 unpivot 需要的鍵；回傳缺少的鍵（依 Id、ClientName、Type 順序）
fn missing_keys(records: &[Record]) -> Vec<String> {
    let mut missing_id = false;
    let mut missing_client = false;
    let mut missing_type = false;

    for record in records {
        let tags = dimension_tags(record);
        if tags.is_empty() {
            continue;
        }
        missing_id |= !present(record.get(ID_FIELD));
        missing_client |= !present(record.get(CLIENT_NAME_FIELD));
        missing_type |= tags.iter().any(|tag| !present(tag.get(TYPE_FIELD)));
    }

    [
        (missing_id, ID_FIELD),
        (missing_client, CLIENT_NAME_FIELD),
        (missing_type, TYPE_FIELD),
    ]
    .into_iter()
    .filter(|(missing, _)| *missing)
    .map(|(_, key)| key.to_string())
    .collect()
}

/// Explodes and pivots the dimension tags of `records`.
///
/// Each `(field, Type)` column is cast with the schema type of its base field
/// (`Value`, `Percent`, ...) before it is given its combined name. Fields the
/// schema does not declare are left as raw values.
pub fn unpivot(records: &[Record], schema: &Schema) -> Result<UnpivotOutcome> {
    let tag_count = dimension_count(records);
    if tag_count == 0 {
        tracing::info!("No rows contain dimension data, continuing without dimension columns");
        return Ok(UnpivotOutcome::NoDimensions);
    }

    let missing = missing_keys(records);
    if !missing.is_empty() {
        tracing::warn!("⚠️ Dimension data is missing required keys: {:?}", missing);
        return Ok(UnpivotOutcome::Mismatch(SchemaMismatch::new(missing)));
    }

    let mut index: HashMap<RowKey, usize> = HashMap::new();
    let mut fields: Vec<String> = Vec::new();
    let mut types: BTreeSet<String> = BTreeSet::new();
    let mut seen: HashSet<(usize, String)> = HashSet::new();
    let mut values: HashMap<(usize, String, String), Value> = HashMap::new();

    for record in records {
        let tags = dimension_tags(record);
        if tags.is_empty() {
            continue;
        }
        // missing_keys 已確認這兩個鍵存在
        let key = (
            record.get(CLIENT_NAME_FIELD).map(key_text).unwrap_or_default(),
            record.get(ID_FIELD).map(key_text).unwrap_or_default(),
        );
        let next_row = index.len();
        let row = *index.entry(key).or_insert(next_row);

        for tag in tags {
            let dim_type = tag.get(TYPE_FIELD).map(key_text).unwrap_or_default();
            if !seen.insert((row, dim_type.clone())) {
                tracing::warn!(
                    "⚠️ Duplicate dimension '{}' on transaction {:?}, keeping the first",
                    dim_type,
                    record.get(ID_FIELD)
                );
                continue;
            }
            types.insert(dim_type.clone());

            for (field, value) in tag.iter().filter(|(field, _)| *field != TYPE_FIELD) {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.clone());
                }
                values.insert((row, field.clone(), dim_type.clone()), value.clone());
            }
        }
    }

    let row_count = index.len();
    let mut table = Table::new(row_count);
    for field in &fields {
        let declared = schema.get(field);
        for dim_type in &types {
            let name = format!("{}{}", dim_type, field);
            let column = (0..row_count)
                .map(|row| {
                    let cell = values
                        .remove(&(row, field.clone(), dim_type.clone()))
                        .map(Cell::from)
                        .unwrap_or(Cell::Null);
                    match declared {
                        Some(target) => cast_cell(&name, cell, target),
                        None => Ok(cell),
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            table.push_column(name, column);
        }
    }

    tracing::debug!(
        "Pivoted {} dimension tags into {} columns over {} transactions",
        tag_count,
        table.column_count(),
        row_count
    );

    Ok(UnpivotOutcome::Pivoted(DimensionTable { index, table }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from(map),
            _ => panic!("test records must be objects"),
        }
    }

    fn pivoted(outcome: UnpivotOutcome) -> DimensionTable {
        match outcome {
            UnpivotOutcome::Pivoted(dims) => dims,
            other => panic!("expected pivoted dimensions, got {:?}", other),
        }
    }

    #[test]
    fn test_single_project_dimension() {
        let records = vec![record(json!({
            "Id": "t1",
            "ClientName": "Tenant A",
            "Dimensions": {"Dimension": [{"Type": "Project", "Value": "X", "Percent": 0.5}]}
        }))];

        let dims = pivoted(unpivot(&records, &Schema::transactions()).unwrap());
        let table = dims.table();
        assert_eq!(table.column_names(), vec!["ProjectValue", "ProjectPercent"]);

        let row = dims.row_for("Tenant A", "t1").unwrap();
        assert_eq!(table.cell("ProjectValue", row), Some(&Cell::Text("X".to_string())));
        assert_eq!(table.cell("ProjectPercent", row), Some(&Cell::Float(0.5)));
    }

    #[test]
    fn test_disjoint_type_vocabularies_are_sparse() {
        let records = vec![
            record(json!({
                "Id": "t1",
                "ClientName": "A",
                "Dimensions": {"Dimension": [{"Type": "Project", "Value": "P1"}]}
            })),
            record(json!({
                "Id": "t1",
                "ClientName": "B",
                "Dimensions": {"Dimension": {"Type": "Department", "Value": 7}}
            })),
        ];

        let dims = pivoted(unpivot(&records, &Schema::transactions()).unwrap());
        let table = dims.table();
        // Types are sorted within each field.
        assert_eq!(table.column_names(), vec!["DepartmentValue", "ProjectValue"]);

        let a = dims.row_for("A", "t1").unwrap();
        let b = dims.row_for("B", "t1").unwrap();
        assert_eq!(table.cell("DepartmentValue", a), Some(&Cell::Null));
        assert_eq!(table.cell("DepartmentValue", b), Some(&Cell::Text("7".to_string())));
        assert_eq!(table.cell("ProjectValue", b), Some(&Cell::Null));
    }

    #[test]
    fn test_no_dimension_data_anywhere() {
        let records = vec![
            record(json!({"Id": "t1", "ClientName": "A", "Dimensions": {}})),
            record(json!({"Id": "t2", "ClientName": "A"})),
            record(json!({"Id": "t3", "ClientName": "A", "Dimensions": {"Dimension": []}})),
        ];

        let outcome = unpivot(&records, &Schema::transactions()).unwrap();
        assert_eq!(outcome, UnpivotOutcome::NoDimensions);
    }

    #[test]
    fn test_missing_keys_produce_diagnostic() {
        let records = vec![
            record(json!({
                "Id": "t1",
                "ClientName": "A",
                "Dimensions": {"Dimension": [{"Type": "Project", "Value": "X"}]}
            })),
            record(json!({
                "ClientName": "A",
                "Dimensions": {"Dimension": [{"Value": "Y"}]}
            })),
        ];

        let outcome = unpivot(&records, &Schema::transactions()).unwrap();
        assert_eq!(
            outcome,
            UnpivotOutcome::Mismatch(SchemaMismatch::new(vec![
                "Id".to_string(),
                "Type".to_string()
            ]))
        );
    }

    #[test]
    fn test_duplicate_type_keeps_first_tag() {
        let records = vec![record(json!({
            "Id": 1,
            "ClientName": "A",
            "Dimensions": {"Dimension": [
                {"Type": "Project", "Value": "first"},
                {"Type": "Project", "Value": "second"}
            ]}
        }))];

        let dims = pivoted(unpivot(&records, &Schema::transactions()).unwrap());
        let row = dims.row_for("A", "1").unwrap();
        assert_eq!(
            dims.table().cell("ProjectValue", row),
            Some(&Cell::Text("first".to_string()))
        );
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let records = vec![
            record(json!({
                "Id": "t1",
                "ClientName": "A",
                "Dimensions": {"Dimension": [{"Type": "Project", "Value": "X", "Percent": 0.5}]}
            })),
            record(json!({"Id": "t2", "ClientName": "A"})),
        ];
        let dims = pivoted(unpivot(&records, &Schema::transactions()).unwrap());

        let mut flat = Table::new(2);
        flat.push_column("Id", vec![Cell::from(json!("t1")), Cell::from(json!("t2"))]);
        flat.push_column("ClientName", vec![Cell::from(json!("A")), Cell::from(json!("A"))]);
        dims.left_join_onto(&mut flat);

        assert_eq!(flat.row_count(), 2);
        assert_eq!(flat.cell("ProjectValue", 0), Some(&Cell::Text("X".to_string())));
        assert_eq!(flat.cell("ProjectPercent", 0), Some(&Cell::Float(0.5)));
        assert_eq!(flat.cell("ProjectValue", 1), Some(&Cell::Null));
        assert_eq!(flat.cell("ProjectPercent", 1), Some(&Cell::Null));
    }

    #[test]
    fn test_uncastable_percent_is_an_error() {
        let records = vec![record(json!({
            "Id": "t1",
            "ClientName": "A",
            "Dimensions": {"Dimension": [{"Type": "Project", "Percent": "half"}]}
        }))];

        assert!(unpivot(&records, &Schema::transactions()).is_err());
    }

    #[test]
    fn test_left_join_suffixes_colliding_columns() {
        let records = vec![record(json!({
            "Id": "t1",
            "ClientName": "A",
            "Dimensions": {"Dimension": [{"Type": "Transaction", "TypeId": 7}]}
        }))];
        let dims = pivoted(unpivot(&records, &Schema::transactions()).unwrap());

        let mut flat = Table::new(1);
        flat.push_column("Id", vec![Cell::from(json!("t1"))]);
        flat.push_column("ClientName", vec![Cell::from(json!("A"))]);
        flat.push_column("TransactionTypeId", vec![Cell::Int(42)]);
        dims.left_join_onto(&mut flat);

        assert_eq!(flat.cell("TransactionTypeId", 0), Some(&Cell::Int(42)));
        assert_eq!(flat.cell("TransactionTypeIdDimension", 0), Some(&Cell::Int(7)));
    }
}
