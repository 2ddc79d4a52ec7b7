use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Field name the aggregator stamps onto every record.
pub const CLIENT_NAME_FIELD: &str = "ClientName";

/// 單筆來源紀錄，欄位名稱沿用來源 API 的命名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: serde_json::Value) {
        self.data.insert(field.into(), value);
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { data }
    }
}

/// One tenant context reachable under the shared credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub ordinal: usize,
    pub identity_id: String,
    pub tenant_name: String,
}

/// Identity as listed by the upstream API, before ordinals are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityListing {
    pub identity_id: String,
    pub tenant_name: String,
}

/// 單次 fetch 的結果；`count` 只作為提早結束的訊號
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    #[serde(default)]
    pub count: u64,
    #[serde(rename = "results", default)]
    pub records: Vec<Record>,
}

impl RawResult {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            count: records.len() as u64,
            records,
        }
    }
}

/// All tenants' records in identity order, each tagged with `ClientName`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    pub count: u64,
    pub records: Vec<Record>,
}

impl AggregatedResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub api_key: String,
}

// 密碼與金鑰不寫進 log
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("api_key", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }
}

/// The two record types the pipelines produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Accounts,
    Transactions,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::Accounts => write!(f, "accounts"),
            RecordType::Transactions => write!(f, "transactions"),
        }
    }
}
