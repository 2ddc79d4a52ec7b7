use crate::domain::model::{
    AggregatedResult, Credentials, DateRange, IdentityListing, RawResult, RecordType,
};
use crate::domain::outcome::{LoadResponse, PipelineOutcome};
use crate::domain::table::Table;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_endpoint(&self) -> &str;
    fn credentials(&self) -> &Credentials;
    fn retry_attempts(&self) -> u32;
    fn request_timeout_seconds(&self) -> u64;
    fn date_range(&self) -> DateRange;
    fn container(&self) -> &str;
    fn destination_for(&self, record_type: RecordType) -> &str;
}

/// Entry point to the bookkeeping API; each call yields a new authenticated session.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    type Session: LedgerSession;

    async fn open_session(&self, credentials: &Credentials) -> Result<Self::Session>;
}

/// 一個已登入的 session。綁定 identity 會改變 session 狀態，所以需要 `&mut self`
#[async_trait]
pub trait LedgerSession: Send {
    async fn list_identities(&mut self) -> Result<Vec<IdentityListing>>;
    async fn bind_identity(&mut self, identity_id: &str) -> Result<()>;
    async fn fetch_accounts(&mut self) -> Result<RawResult>;
    async fn fetch_transactions(&mut self, range: &DateRange) -> Result<RawResult>;
}

/// Destination that replaces its whole content with one table.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Returns the number of rows written.
    async fn write_table(&self, destination: &str, table: &Table) -> Result<usize>;

    /// Human-readable location of `destination`, used in responses.
    fn describe(&self, destination: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    fn record_type(&self) -> RecordType;
    async fn extract(&self) -> Result<AggregatedResult>;
    async fn transform(&self, data: AggregatedResult) -> Result<PipelineOutcome>;
    async fn load(&self, outcome: PipelineOutcome) -> Result<LoadResponse>;
}
