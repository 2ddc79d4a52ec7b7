use crate::core::fetcher::{fetch_for_identity, FetchOperation};
use crate::domain::model::{AggregatedResult, Credentials, Identity, RawResult, CLIENT_NAME_FIELD};
use crate::domain::ports::{LedgerApi, LedgerSession};
use crate::utils::error::{EtlError, Result};

/// 以同一組帳密列出所有 identity，逐一抓取後合併成單一結果
pub struct MultiTenantAggregator<'a, A: LedgerApi> {
    api: &'a A,
    credentials: &'a Credentials,
    retries: u32,
}

impl<'a, A: LedgerApi> MultiTenantAggregator<'a, A> {
    pub fn new(api: &'a A, credentials: &'a Credentials, retries: u32) -> Self {
        Self {
            api,
            credentials,
            retries,
        }
    }

    /// Lists identities once with the base credentials. Not retried.
    pub async fn identities(&self) -> Result<Vec<Identity>> {
        let listings = async {
            let mut session = self.api.open_session(self.credentials).await?;
            session.list_identities().await
        }
        .await
        .map_err(|e| EtlError::IdentityEnumeration {
            source: Box::new(e),
        })?;

        Ok(listings
            .into_iter()
            .enumerate()
            .map(|(ordinal, listing)| Identity {
                ordinal,
                identity_id: listing.identity_id,
                tenant_name: listing.tenant_name,
            })
            .collect())
    }

    /// Fetches `operation` for every identity in ordinal order and concatenates
    /// the non-empty results. Any tenant exhausting its retries aborts the run.
    pub async fn aggregate(&self, operation: &FetchOperation) -> Result<AggregatedResult> {
        let identities = self.identities().await?;
        tracing::info!(
            "🔑 Found {} identities, fetching {}",
            identities.len(),
            operation.name()
        );

        let mut per_tenant: Vec<RawResult> = Vec::with_capacity(identities.len());
        for identity in &identities {
            let raw = fetch_for_identity(
                self.api,
                self.credentials,
                identity,
                operation,
                self.retries,
            )
            .await?;

            if raw.count == 0 {
                tracing::debug!("No {} for '{}', skipping", operation.name(), identity.tenant_name);
                continue;
            }

            tracing::info!(
                "📥 {} {} loaded for '{}'",
                raw.records.len(),
                operation.name(),
                identity.tenant_name
            );
            per_tenant.push(tag_with_tenant(raw, identity));
        }

        Ok(combine(per_tenant))
    }
}

fn tag_with_tenant(mut raw: RawResult, identity: &Identity) -> RawResult {
    for record in &mut raw.records {
        record.insert(
            CLIENT_NAME_FIELD,
            serde_json::Value::String(identity.tenant_name.clone()),
        );
    }
    raw
}

/// Concatenates per-tenant results in order and sums their counts.
pub fn combine(results: Vec<RawResult>) -> AggregatedResult {
    results
        .into_iter()
        .fold(AggregatedResult::default(), |mut acc, raw| {
            acc.count += raw.count;
            acc.records.extend(raw.records);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use serde_json::json;

    fn records(ids: &[i64]) -> Vec<Record> {
        ids.iter()
            .map(|id| {
                let mut record = Record::default();
                record.insert("AccountId", json!(id));
                record
            })
            .collect()
    }

    #[test]
    fn test_combine_preserves_tenant_order() {
        let combined = combine(vec![
            RawResult::new(records(&[1, 2, 3])),
            RawResult::new(records(&[4, 5])),
        ]);

        assert_eq!(combined.count, 5);
        let ids: Vec<i64> = combined
            .records
            .iter()
            .map(|r| r.get("AccountId").and_then(|v| v.as_i64()).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_combine_nothing_is_empty() {
        let combined = combine(Vec::new());
        assert!(combined.is_empty());
        assert!(combined.records.is_empty());
    }

    #[test]
    fn test_tag_with_tenant_sets_client_name() {
        let identity = Identity {
            ordinal: 0,
            identity_id: "id-a".to_string(),
            tenant_name: "Tenant A".to_string(),
        };
        let tagged = tag_with_tenant(RawResult::new(records(&[1, 2])), &identity);
        assert!(tagged
            .records
            .iter()
            .all(|r| r.get(CLIENT_NAME_FIELD) == Some(&json!("Tenant A"))));
    }
}
