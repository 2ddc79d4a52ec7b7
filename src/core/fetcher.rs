use crate::domain::model::{Credentials, DateRange, Identity, RawResult};
use crate::domain::ports::{LedgerApi, LedgerSession};
use crate::utils::error::Result;
use std::future::Future;

pub const DEFAULT_RETRIES: u32 = 3;

/// Upstream call made once per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOperation {
    Accounts,
    Transactions(DateRange),
}

impl FetchOperation {
    pub async fn run<S: LedgerSession>(&self, session: &mut S) -> Result<RawResult> {
        match self {
            FetchOperation::Accounts => session.fetch_accounts().await,
            FetchOperation::Transactions(range) => session.fetch_transactions(range).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FetchOperation::Accounts => "accounts",
            FetchOperation::Transactions(_) => "transactions",
        }
    }
}

/// 最多嘗試 `retries` 次，立即重試不等待；最後一次的錯誤原樣回傳
///
/// `attempt` receives the 1-based attempt number. A bound of 0 still makes
/// one attempt.
pub async fn retry_with_bound<T, F, Fut>(retries: u32, label: &str, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retries = retries.max(1);
    let mut number = 1;
    loop {
        match attempt(number).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::info!("HTTP request attempt {} for {} failed: {}", number, label, e);
                if number >= retries {
                    return Err(e);
                }
                tracing::info!("Retrying {} ({}/{})...", label, number + 1, retries);
                number += 1;
            }
        }
    }
}

/// Runs `operation` for one identity, each attempt on a fresh session.
pub async fn fetch_for_identity<A: LedgerApi>(
    api: &A,
    credentials: &Credentials,
    identity: &Identity,
    operation: &FetchOperation,
    retries: u32,
) -> Result<RawResult> {
    let label = format!("{} of '{}'", operation.name(), identity.tenant_name);
    retry_with_bound(retries, &label, |_| async move {
        let mut session = api.open_session(credentials).await?;
        session.bind_identity(&identity.identity_id).await?;
        operation.run(&mut session).await
    })
    .await
}
