use crate::core::{Storage, TableSink};
use crate::domain::table::{Cell, Table};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;

pub const DEFAULT_DELIMITER: u8 = b'|';
pub const DEFAULT_CONTAINER: &str = "functions";

/// 以分隔字元輸出表格：含標題列、UTF-8、不輸出索引欄
pub fn render_delimited(table: &Table, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(table.column_names())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.render()))?;
    }

    writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
}

/// Writes each table as `{container}/{destination}.csv`, overwriting the blob.
#[derive(Debug, Clone)]
pub struct DelimitedFileSink<S: Storage> {
    storage: S,
    container: String,
}

impl<S: Storage> DelimitedFileSink<S> {
    pub fn new(storage: S, container: impl Into<String>) -> Self {
        Self {
            storage,
            container: container.into(),
        }
    }

    fn blob_name(&self, destination: &str) -> String {
        format!("{}/{}.csv", self.container, destination)
    }
}

#[async_trait]
impl<S: Storage> TableSink for DelimitedFileSink<S> {
    async fn write_table(&self, destination: &str, table: &Table) -> Result<usize> {
        let data = render_delimited(table, DEFAULT_DELIMITER)?;
        let blob = self.blob_name(destination);
        tracing::debug!("Writing {} bytes to {}", data.len(), blob);
        self.storage.write_file(&blob, &data).await?;
        Ok(table.row_count())
    }

    fn describe(&self, destination: &str) -> String {
        self.blob_name(destination)
    }
}

/// Relational sink: truncates the target table and bulk-inserts in one transaction.
pub struct SqliteTableSink {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteTableSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let label = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            label: ":memory:".to_string(),
        })
    }

    /// Runs `f` with the underlying connection, e.g. to read back a load.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock(&self.label)?;
        f(&conn)
    }

    fn lock(&self, destination: &str) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EtlError::Sink {
            destination: destination.to_string(),
            message: "connection lock poisoned".to_string(),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 依欄位內容推斷 SQLite 欄位型別；空欄位一律 TEXT
fn sql_type(values: &[Cell]) -> &'static str {
    values
        .iter()
        .find(|cell| !cell.is_null())
        .map(|cell| match cell {
            Cell::Int(_) | Cell::Bool(_) => "INTEGER",
            Cell::Float(_) => "REAL",
            _ => "TEXT",
        })
        .unwrap_or("TEXT")
}

fn sql_value(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Null => SqlValue::Null,
        Cell::Int(v) => SqlValue::Integer(*v),
        Cell::Float(v) => SqlValue::Real(*v),
        Cell::Bool(b) => SqlValue::Integer(i64::from(*b)),
        other if other.is_null() => SqlValue::Null,
        other => SqlValue::Text(other.render()),
    }
}

#[async_trait]
impl TableSink for SqliteTableSink {
    async fn write_table(&self, destination: &str, table: &Table) -> Result<usize> {
        let mut conn = self.lock(destination)?;
        let target = quote_ident(destination);

        let column_defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(&c.values)))
            .collect();

        let tx = conn.transaction()?;
        if !column_defs.is_empty() {
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({});",
                target,
                column_defs.join(", ")
            ))?;
        }
        tx.execute(&format!("DELETE FROM {}", target), [])
            .map_err(|e| EtlError::Sink {
                destination: destination.to_string(),
                message: format!("truncate failed: {}", e),
            })?;

        let mut written = 0;
        if !table.is_empty() {
            let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(&c.name)).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target,
                columns.join(", "),
                placeholders.join(", ")
            );
            let mut stmt = tx.prepare(&sql)?;
            for row in table.rows() {
                written += stmt.execute(params_from_iter(row.into_iter().map(sql_value)))?;
            }
        }
        tx.commit()?;

        tracing::debug!("Loaded {} rows into {}", written, destination);
        Ok(written)
    }

    fn describe(&self, destination: &str) -> String {
        format!("{}#{}", self.label, destination)
    }
}
