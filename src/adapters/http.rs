use crate::core::{LedgerApi, LedgerSession};
use crate::domain::model::{Credentials, DateRange, IdentityListing, RawResult};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SESSION_HEADER: &str = "X-Session-Id";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    username: &'a str,
    password: &'a str,
    api_key: &'a str,
}

#[derive(Deserialize)]
struct AuthenticateResponse {
    session_id: String,
}

#[derive(Serialize)]
struct BindIdentityRequest<'a> {
    identity_id: &'a str,
}

#[derive(Deserialize)]
struct IdentityEnvelope {
    #[serde(default)]
    results: Vec<IdentityEntry>,
}

#[derive(Deserialize)]
struct IdentityEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Client")]
    client: ClientEntry,
}

#[derive(Deserialize)]
struct ClientEntry {
    #[serde(rename = "Name")]
    name: String,
}

/// JSON/HTTP client for the bookkeeping API.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl LedgerApi for HttpLedgerClient {
    type Session = HttpLedgerSession;

    async fn open_session(&self, credentials: &Credentials) -> Result<HttpLedgerSession> {
        tracing::debug!("Authenticating as {}", credentials.username);
        let response = self
            .client
            .post(self.url("authenticate"))
            .timeout(self.timeout)
            .json(&AuthenticateRequest {
                username: &credentials.username,
                password: &credentials.password,
                api_key: &credentials.api_key,
            })
            .send()
            .await?;

        let auth: AuthenticateResponse = read_json(response).await?;
        Ok(HttpLedgerSession {
            api: self.clone(),
            session_id: auth.session_id,
        })
    }
}

/// 已登入的 session，綁定 identity 之後的呼叫都限定在該 client
#[derive(Debug)]
pub struct HttpLedgerSession {
    api: HttpLedgerClient,
    session_id: String,
}

impl HttpLedgerSession {
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(SESSION_HEADER, &self.session_id)
            .timeout(self.api.timeout)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(self.api.client.get(self.api.url(path)))
    }
}

#[async_trait]
impl LedgerSession for HttpLedgerSession {
    async fn list_identities(&mut self) -> Result<Vec<IdentityListing>> {
        let response = self.get("identities").send().await?;
        let envelope: IdentityEnvelope = read_json(response).await?;
        Ok(envelope
            .results
            .into_iter()
            .map(|entry| IdentityListing {
                identity_id: entry.id,
                tenant_name: entry.client.name,
            })
            .collect())
    }

    async fn bind_identity(&mut self, identity_id: &str) -> Result<()> {
        let response = self
            .request(self.api.client.put(self.api.url("identity")))
            .json(&BindIdentityRequest { identity_id })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_accounts(&mut self) -> Result<RawResult> {
        let response = self.get("accounts").send().await?;
        read_json(response).await
    }

    async fn fetch_transactions(&mut self, range: &DateRange) -> Result<RawResult> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(start) = range.start {
            query.push(("date_start", start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = range.end {
            query.push(("date_end", end.format(DATE_FORMAT).to_string()));
        }

        let response = self.get("transactions").query(&query).send().await?;
        read_json(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::debug!("Upstream returned {}: {}", status, message);
    Err(EtlError::Upstream {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
