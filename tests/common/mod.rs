#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tenant_ledger_etl::core::{ConfigProvider, LedgerApi, LedgerSession, TableSink};
use tenant_ledger_etl::domain::model::{
    Credentials, DateRange, IdentityListing, RawResult, Record, RecordType,
};
use tenant_ledger_etl::domain::table::Table;
use tenant_ledger_etl::{EtlError, Result};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => Record::from(map),
        other => panic!("test records must be objects, got {}", other),
    }
}

pub fn raw(values: Vec<Value>) -> RawResult {
    RawResult::new(values.into_iter().map(record).collect())
}

#[derive(Default)]
struct TenantScript {
    name: String,
    accounts: RawResult,
    transactions: RawResult,
    failures: u32,
    attempts: AtomicU32,
}

#[derive(Default)]
struct LedgerState {
    tenants: Vec<(String, TenantScript)>,
    fail_listing: bool,
    sessions: AtomicU32,
    seen_ranges: Mutex<Vec<DateRange>>,
}

/// In-memory ledger: tenants are listed in insertion order and each fetch can
/// fail a scripted number of times before succeeding.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<LedgerState>,
}

pub struct MockLedgerBuilder {
    state: LedgerState,
}

impl MockLedger {
    pub fn builder() -> MockLedgerBuilder {
        MockLedgerBuilder {
            state: LedgerState::default(),
        }
    }

    /// Fetch attempts made for `identity_id` so far.
    pub fn attempts(&self, identity_id: &str) -> u32 {
        self.tenant(identity_id)
            .map(|t| t.attempts.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.sessions.load(Ordering::SeqCst)
    }

    pub fn seen_ranges(&self) -> Vec<DateRange> {
        self.state.seen_ranges.lock().unwrap().clone()
    }

    fn tenant(&self, identity_id: &str) -> Option<&TenantScript> {
        self.state
            .tenants
            .iter()
            .find(|(id, _)| id == identity_id)
            .map(|(_, t)| t)
    }
}

impl MockLedgerBuilder {
    pub fn tenant(mut self, identity_id: &str, name: &str) -> Self {
        self.state.tenants.push((
            identity_id.to_string(),
            TenantScript {
                name: name.to_string(),
                ..Default::default()
            },
        ));
        self
    }

    pub fn accounts(mut self, values: Vec<Value>) -> Self {
        self.last().accounts = raw(values);
        self
    }

    pub fn transactions(mut self, values: Vec<Value>) -> Self {
        self.last().transactions = raw(values);
        self
    }

    /// The last added tenant fails its first `times` fetches.
    pub fn failing(mut self, times: u32) -> Self {
        self.last().failures = times;
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.state.fail_listing = true;
        self
    }

    pub fn build(self) -> MockLedger {
        MockLedger {
            state: Arc::new(self.state),
        }
    }

    fn last(&mut self) -> &mut TenantScript {
        &mut self
            .state
            .tenants
            .last_mut()
            .expect("add a tenant first")
            .1
    }
}

pub struct MockSession {
    ledger: MockLedger,
    bound: Option<String>,
}

impl MockSession {
    fn fetch(&self, pick: impl Fn(&TenantScript) -> RawResult) -> Result<RawResult> {
        let id = self.bound.as_deref().ok_or_else(|| EtlError::Upstream {
            status: 400,
            message: "no identity bound".to_string(),
        })?;
        let tenant = self.ledger.tenant(id).ok_or_else(|| EtlError::Upstream {
            status: 404,
            message: format!("unknown identity {}", id),
        })?;

        let attempt = tenant.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= tenant.failures {
            return Err(EtlError::Upstream {
                status: 503,
                message: format!("{} attempt {} failed", tenant.name, attempt),
            });
        }
        Ok(pick(tenant))
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    type Session = MockSession;

    async fn open_session(&self, _credentials: &Credentials) -> Result<MockSession> {
        self.state.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            ledger: self.clone(),
            bound: None,
        })
    }
}

#[async_trait]
impl LedgerSession for MockSession {
    async fn list_identities(&mut self) -> Result<Vec<IdentityListing>> {
        if self.ledger.state.fail_listing {
            return Err(EtlError::Upstream {
                status: 500,
                message: "identity service unavailable".to_string(),
            });
        }
        Ok(self
            .ledger
            .state
            .tenants
            .iter()
            .map(|(id, t)| IdentityListing {
                identity_id: id.clone(),
                tenant_name: t.name.clone(),
            })
            .collect())
    }

    async fn bind_identity(&mut self, identity_id: &str) -> Result<()> {
        self.bound = Some(identity_id.to_string());
        Ok(())
    }

    async fn fetch_accounts(&mut self) -> Result<RawResult> {
        self.fetch(|t| t.accounts.clone())
    }

    async fn fetch_transactions(&mut self, range: &DateRange) -> Result<RawResult> {
        self.ledger.state.seen_ranges.lock().unwrap().push(*range);
        self.fetch(|t| t.transactions.clone())
    }
}

/// Keeps every written table in memory.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<(String, Table)>>,
}

impl RecordingSink {
    pub fn writes(&self) -> Vec<(String, Table)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableSink for RecordingSink {
    async fn write_table(&self, destination: &str, table: &Table) -> Result<usize> {
        self.writes
            .lock()
            .unwrap()
            .push((destination.to_string(), table.clone()));
        Ok(table.row_count())
    }

    fn describe(&self, destination: &str) -> String {
        format!("memory/{}", destination)
    }
}

pub struct TestConfig {
    pub credentials: Credentials,
    pub retries: u32,
    pub range: DateRange,
}

impl TestConfig {
    pub fn new(retries: u32) -> Self {
        Self {
            credentials: Credentials {
                username: "uid".to_string(),
                password: "pwd".to_string(),
                api_key: "key".to_string(),
            },
            retries,
            range: DateRange::default(),
        }
    }
}

impl ConfigProvider for TestConfig {
    fn api_endpoint(&self) -> &str {
        "http://ledger.invalid"
    }

    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn retry_attempts(&self) -> u32 {
        self.retries
    }

    fn request_timeout_seconds(&self) -> u64 {
        5
    }

    fn date_range(&self) -> DateRange {
        self.range
    }

    fn container(&self) -> &str {
        "functions"
    }

    fn destination_for(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::Accounts => "24SO_Account",
            RecordType::Transactions => "24SO_Transaction",
        }
    }
}
