use serde::{Deserialize, Serialize};

/// Target type tag for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Nullable 64-bit integer.
    Int,
    Float,
    String,
    Bool,
    DateTime,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Bool => "bool",
            ColumnType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// 欄位名稱（來源命名）到目標型別的對應，保留宣告順序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn accounts() -> Self {
        Self::new([
            ("ClientName", ColumnType::String),
            ("AccountId", ColumnType::Int),
            ("AccountNo", ColumnType::Int),
            ("AccountName", ColumnType::String),
            ("AccountTax", ColumnType::Int),
            ("TaxNo", ColumnType::Int),
        ])
    }

    /// Transaction columns plus the base fields of dimension tags
    /// (`Type`, `Name`, `Value`, `Percent`, `TypeId`).
    pub fn transactions() -> Self {
        Self::new([
            ("ClientName", ColumnType::String),
            ("Date", ColumnType::DateTime),
            ("AccountNo", ColumnType::Int),
            ("Currency", ColumnType::String),
            ("CurrencyRate", ColumnType::Float),
            ("CurrencyUnit", ColumnType::Int),
            ("Amount", ColumnType::Float),
            ("StampNo", ColumnType::Int),
            ("Period", ColumnType::String),
            ("TransactionTypeId", ColumnType::Int),
            ("Comment", ColumnType::String),
            ("TransactionNo", ColumnType::Int),
            ("VatCode", ColumnType::Int),
            ("Id", ColumnType::String),
            ("LinkId", ColumnType::Int),
            ("InvoiceNo", ColumnType::String),
            ("SequenceNo", ColumnType::Int),
            ("SystemType", ColumnType::String),
            ("DueDate", ColumnType::DateTime),
            ("RegistrationDate", ColumnType::DateTime),
            ("DateChanged", ColumnType::DateTime),
            ("Hidden", ColumnType::Bool),
            ("Open", ColumnType::Bool),
            ("OCR", ColumnType::String),
            ("VatDividend", ColumnType::Float),
            ("HasVatDividend", ColumnType::Bool),
            ("Type", ColumnType::String),
            ("Name", ColumnType::String),
            ("Value", ColumnType::String),
            ("Percent", ColumnType::Float),
            ("TypeId", ColumnType::Int),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounts_schema_order() {
        let schema = Schema::accounts();
        let names: Vec<&str> = schema.column_names().collect();
        assert_eq!(
            names,
            vec!["ClientName", "AccountId", "AccountNo", "AccountName", "AccountTax", "TaxNo"]
        );
    }

    #[test]
    fn test_lookup() {
        let schema = Schema::transactions();
        assert_eq!(schema.get("Percent"), Some(ColumnType::Float));
        assert_eq!(schema.get("DueDate"), Some(ColumnType::DateTime));
        assert!(!schema.contains("ProjectValue"));
    }
}
