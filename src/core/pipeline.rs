use crate::core::aggregator::MultiTenantAggregator;
use crate::core::coercion::coerce;
use crate::core::dimensions::{self, UnpivotOutcome, DIMENSIONS_FIELD};
use crate::core::fetcher::FetchOperation;
use crate::core::flatten::flatten_records;
use crate::core::naming::to_upper_snake;
use crate::core::{ConfigProvider, LedgerApi, Pipeline, TableSink};
use crate::domain::model::{AggregatedResult, RecordType};
use crate::domain::outcome::{LoadResponse, PipelineOutcome};
use crate::domain::schema::Schema;
use crate::domain::table::Table;
use crate::utils::error::Result;
use std::sync::Arc;

/// Stages one record type goes through. Logged at debug level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Fetching,
    Empty,
    Flattening,
    Typing,
    Renaming,
    Done,
    Error,
}

fn enter(record_type: RecordType, state: PipelineState) {
    tracing::debug!("{} pipeline -> {:?}", record_type, state);
}

/// 把合併後的紀錄轉成最終表格（攤平、unpivot、轉型、改名）
///
/// Accounts with no records become an empty table with the schema's columns;
/// transactions with no records become [`PipelineOutcome::NoData`].
pub fn normalize(
    record_type: RecordType,
    data: AggregatedResult,
    schema: &Schema,
) -> Result<PipelineOutcome> {
    if data.is_empty() {
        enter(record_type, PipelineState::Empty);
        let outcome = match record_type {
            RecordType::Accounts => {
                tracing::info!("No account information found, writing an empty table");
                PipelineOutcome::Table(Table::empty_with_columns(
                    schema.column_names().map(to_upper_snake),
                ))
            }
            RecordType::Transactions => {
                tracing::info!("No transactions found for the given search parameters");
                PipelineOutcome::NoData
            }
        };
        enter(record_type, PipelineState::Done);
        return Ok(outcome);
    }

    enter(record_type, PipelineState::Flattening);
    let mut table = flatten_records(&data.records);

    if record_type == RecordType::Transactions {
        match dimensions::unpivot(&data.records, schema)? {
            UnpivotOutcome::Pivoted(dims) => dims.left_join_onto(&mut table),
            UnpivotOutcome::NoDimensions => {}
            UnpivotOutcome::Mismatch(mismatch) => {
                enter(record_type, PipelineState::Error);
                return Ok(PipelineOutcome::SchemaMismatch(mismatch));
            }
        }
        drop_dimension_columns(&mut table);
    }

    enter(record_type, PipelineState::Typing);
    let mut table = coerce(table, schema)?;

    enter(record_type, PipelineState::Renaming);
    table.rename_columns(to_upper_snake);

    enter(record_type, PipelineState::Done);
    Ok(PipelineOutcome::Table(table))
}

/// 移除 `Dimensions` 以及攤平後產生的 `Dimensions.*` 欄位
fn drop_dimension_columns(table: &mut Table) {
    let prefix = format!("{}.", DIMENSIONS_FIELD);
    let nested: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| *name == DIMENSIONS_FIELD || name.starts_with(&prefix))
        .map(str::to_string)
        .collect();
    let nested: Vec<&str> = nested.iter().map(String::as_str).collect();
    table.drop_columns(&nested);
}

/// Fetch-aggregate-normalize pipeline for one record type, writing to one sink.
pub struct LedgerPipeline<A: LedgerApi, K: TableSink, C: ConfigProvider> {
    api: Arc<A>,
    sink: Arc<K>,
    config: Arc<C>,
    record_type: RecordType,
    schema: Schema,
}

impl<A: LedgerApi, K: TableSink, C: ConfigProvider> LedgerPipeline<A, K, C> {
    pub fn new(api: Arc<A>, sink: Arc<K>, config: Arc<C>, record_type: RecordType) -> Self {
        let schema = match record_type {
            RecordType::Accounts => Schema::accounts(),
            RecordType::Transactions => Schema::transactions(),
        };
        Self {
            api,
            sink,
            config,
            record_type,
            schema,
        }
    }

    pub fn accounts(api: Arc<A>, sink: Arc<K>, config: Arc<C>) -> Self {
        Self::new(api, sink, config, RecordType::Accounts)
    }

    pub fn transactions(api: Arc<A>, sink: Arc<K>, config: Arc<C>) -> Self {
        Self::new(api, sink, config, RecordType::Transactions)
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    fn operation(&self) -> FetchOperation {
        match self.record_type {
            RecordType::Accounts => FetchOperation::Accounts,
            RecordType::Transactions => FetchOperation::Transactions(self.config.date_range()),
        }
    }

    fn destination(&self) -> &str {
        self.config.destination_for(self.record_type)
    }
}

#[async_trait::async_trait]
impl<A: LedgerApi, K: TableSink, C: ConfigProvider> Pipeline for LedgerPipeline<A, K, C> {
    fn record_type(&self) -> RecordType {
        self.record_type
    }

    async fn extract(&self) -> Result<AggregatedResult> {
        enter(self.record_type, PipelineState::Fetching);
        let aggregator = MultiTenantAggregator::new(
            self.api.as_ref(),
            self.config.credentials(),
            self.config.retry_attempts(),
        );
        let operation = self.operation();
        let result = aggregator.aggregate(&operation).await;
        if result.is_err() {
            enter(self.record_type, PipelineState::Error);
        }
        result
    }

    async fn transform(&self, data: AggregatedResult) -> Result<PipelineOutcome> {
        normalize(self.record_type, data, &self.schema)
    }

    async fn load(&self, outcome: PipelineOutcome) -> Result<LoadResponse> {
        let destination = self.destination();
        let location = self.sink.describe(destination);

        match outcome {
            PipelineOutcome::Table(table) => {
                let written = self.sink.write_table(destination, &table).await?;
                tracing::info!("💾 {} data written to {}", self.record_type, location);
                Ok(LoadResponse::written(written, location))
            }
            PipelineOutcome::NoData => Ok(LoadResponse::no_data(location)),
            PipelineOutcome::SchemaMismatch(mismatch) => {
                tracing::warn!("⚠️ Nothing written to {}: {}", location, mismatch.error_text());
                Ok(LoadResponse::schema_mismatch(&mismatch))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::combine;
    use crate::domain::model::{RawResult, Record};
    use crate::domain::table::Cell;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from(map),
            _ => panic!("test records must be objects"),
        }
    }

    fn aggregated(records: Vec<Record>) -> AggregatedResult {
        combine(vec![RawResult::new(records)])
    }

    fn table(outcome: PipelineOutcome) -> Table {
        match outcome {
            PipelineOutcome::Table(table) => table,
            other => panic!("expected a table, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_accounts_have_schema_columns() {
        let outcome = normalize(
            RecordType::Accounts,
            AggregatedResult::default(),
            &Schema::accounts(),
        )
        .unwrap();

        let table = table(outcome);
        assert!(table.is_empty());
        assert_eq!(
            table.column_names(),
            vec!["CLIENT_NAME", "ACCOUNT_ID", "ACCOUNT_NO", "ACCOUNT_NAME", "ACCOUNT_TAX", "TAX_NO"]
        );
    }

    #[test]
    fn test_empty_transactions_are_no_data() {
        let outcome = normalize(
            RecordType::Transactions,
            AggregatedResult::default(),
            &Schema::transactions(),
        )
        .unwrap();
        assert_eq!(outcome, PipelineOutcome::NoData);
    }

    #[test]
    fn test_count_without_records_is_empty() {
        let stale = || AggregatedResult {
            count: 2,
            records: Vec::new(),
        };

        let accounts = table(normalize(RecordType::Accounts, stale(), &Schema::accounts()).unwrap());
        assert!(accounts.is_empty());
        assert_eq!(accounts.column_names().len(), 6);

        let transactions =
            normalize(RecordType::Transactions, stale(), &Schema::transactions()).unwrap();
        assert_eq!(transactions, PipelineOutcome::NoData);
    }

    #[test]
    fn test_accounts_are_typed_and_renamed() {
        let data = aggregated(vec![record(json!({
            "AccountId": 1,
            "AccountNo": 100,
            "AccountName": "Acme",
            "AccountTax": 0,
            "TaxNo": 5,
            "ClientName": "Tenant A"
        }))]);

        let table = table(normalize(RecordType::Accounts, data, &Schema::accounts()).unwrap());
        assert_eq!(
            table.column_names(),
            vec!["ACCOUNT_ID", "ACCOUNT_NO", "ACCOUNT_NAME", "ACCOUNT_TAX", "TAX_NO", "CLIENT_NAME"]
        );
        assert_eq!(table.cell("ACCOUNT_NO", 0), Some(&Cell::Int(100)));
        assert_eq!(table.cell("CLIENT_NAME", 0), Some(&Cell::Text("Tenant A".to_string())));
    }

    #[test]
    fn test_transactions_with_dimensions() {
        let data = aggregated(vec![
            record(json!({
                "Id": "t1",
                "DueDate": "2024-01-01T00:00:00Z",
                "Amount": 250.0,
                "Dimensions": {"Dimension": [{"Type": "Project", "Value": "X", "Percent": 0.5}]},
                "ClientName": "Tenant A"
            })),
            record(json!({
                "Id": "t2",
                "DueDate": null,
                "Amount": -20,
                "Dimensions": {"Dimension": []},
                "ClientName": "Tenant A"
            })),
        ]);

        let table =
            table(normalize(RecordType::Transactions, data, &Schema::transactions()).unwrap());

        assert_eq!(
            table.column_names(),
            vec!["ID", "DUE_DATE", "AMOUNT", "CLIENT_NAME", "PROJECT_VALUE", "PROJECT_PERCENT"]
        );
        let due = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(table.cell("DUE_DATE", 0), Some(&Cell::Timestamp(due)));
        assert_eq!(table.cell("DUE_DATE", 1), Some(&Cell::Null));
        assert_eq!(table.cell("PROJECT_VALUE", 0), Some(&Cell::Text("X".to_string())));
        assert_eq!(table.cell("PROJECT_PERCENT", 0), Some(&Cell::Float(0.5)));
        assert_eq!(table.cell("PROJECT_VALUE", 1), Some(&Cell::Null));
        assert_eq!(table.cell("AMOUNT", 1), Some(&Cell::Float(-20.0)));
    }

    #[test]
    fn test_transactions_without_any_dimensions() {
        let data = aggregated(vec![record(json!({
            "Id": "t1",
            "Amount": 1.5,
            "Dimensions": {},
            "ClientName": "Tenant A"
        }))]);

        let table =
            table(normalize(RecordType::Transactions, data, &Schema::transactions()).unwrap());
        assert_eq!(table.column_names(), vec!["ID", "AMOUNT", "CLIENT_NAME"]);
    }

    #[test]
    fn test_single_tag_object_leaves_no_nested_columns() {
        let data = aggregated(vec![record(json!({
            "Id": "t1",
            "Dimensions": {"Dimension": {"Type": "Department", "Value": "Sales"}},
            "ClientName": "Tenant A"
        }))]);

        let table =
            table(normalize(RecordType::Transactions, data, &Schema::transactions()).unwrap());
        assert_eq!(table.column_names(), vec!["ID", "CLIENT_NAME", "DEPARTMENT_VALUE"]);
    }

    #[test]
    fn test_malformed_dimensions_short_circuit() {
        let data = aggregated(vec![record(json!({
            "Id": "t1",
            "Dimensions": {"Dimension": [{"Value": "X"}]},
            "ClientName": "Tenant A"
        }))]);

        let outcome = normalize(RecordType::Transactions, data, &Schema::transactions()).unwrap();
        match outcome {
            PipelineOutcome::SchemaMismatch(mismatch) => {
                assert_eq!(mismatch.missing_keys, vec!["Type".to_string()])
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_dimension_column_does_not_replace_source_column() {
        let data = aggregated(vec![record(json!({
            "Id": "t1",
            "TransactionTypeId": 42,
            "Dimensions": {"Dimension": [{"Type": "Transaction", "TypeId": 7}]},
            "ClientName": "Tenant A"
        }))]);

        let table =
            table(normalize(RecordType::Transactions, data, &Schema::transactions()).unwrap());
        assert_eq!(
            table.column_names(),
            vec!["ID", "TRANSACTION_TYPE_ID", "CLIENT_NAME", "TRANSACTION_TYPE_ID_DIMENSION"]
        );
        assert_eq!(table.cell("TRANSACTION_TYPE_ID", 0), Some(&Cell::Int(42)));
        assert_eq!(table.cell("TRANSACTION_TYPE_ID_DIMENSION", 0), Some(&Cell::Int(7)));
    }
}
