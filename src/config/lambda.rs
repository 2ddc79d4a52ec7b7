use crate::adapters::sink::DEFAULT_CONTAINER;
use crate::config::toml_config::{
    DEFAULT_ACCOUNT_TABLE, DEFAULT_TIMEOUT_SECONDS, DEFAULT_TRANSACTION_TABLE,
};
use crate::core::fetcher::DEFAULT_RETRIES;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::{Credentials, DateRange, RecordType};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use std::env;

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub api_endpoint: String,
    pub credentials: Credentials,
    pub date_range: DateRange,
    pub s3_bucket: String,
    pub s3_region: String,
    pub container: String,
    pub account_table: String,
    pub transaction_table: String,
    pub retry_attempts: u32,
    pub timeout_seconds: u64,
}

impl LambdaConfig {
    /// 從環境變數讀取；帳密可由事件覆蓋
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_endpoint: env::var("LEDGER_ENDPOINT").map_err(|_| EtlError::MissingConfigError {
                field: "LEDGER_ENDPOINT".to_string(),
            })?,
            credentials: Credentials {
                username: env::var("LEDGER_UID").unwrap_or_default(),
                password: env::var("LEDGER_PWD").unwrap_or_default(),
                api_key: env::var("LEDGER_KEY").unwrap_or_default(),
            },
            date_range: DateRange::default(),
            s3_bucket: env::var("S3_BUCKET").map_err(|_| EtlError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "ap-southeast-2".to_string()),
            container: env::var("LEDGER_CONTAINER").unwrap_or_else(|_| DEFAULT_CONTAINER.to_string()),
            account_table: env::var("LEDGER_ACCOUNT_TABLE")
                .unwrap_or_else(|_| DEFAULT_ACCOUNT_TABLE.to_string()),
            transaction_table: env::var("LEDGER_TRANSACTION_TABLE")
                .unwrap_or_else(|_| DEFAULT_TRANSACTION_TABLE.to_string()),
            retry_attempts: parse_env("LEDGER_RETRIES", DEFAULT_RETRIES)?,
            timeout_seconds: parse_env("LEDGER_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| EtlError::InvalidConfigValueError {
            field: name.to_string(),
            value: raw,
            reason: "not a valid number".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl ConfigProvider for LambdaConfig {
    fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn request_timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn date_range(&self) -> DateRange {
        self.date_range
    }

    fn container(&self) -> &str {
        &self.container
    }

    fn destination_for(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::Accounts => &self.account_table,
            RecordType::Transactions => &self.transaction_table,
        }
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api_endpoint", &self.api_endpoint)?;

        validation::validate_non_empty_string("uid", &self.credentials.username)?;
        validation::validate_non_empty_string("pwd", &self.credentials.password)?;
        validation::validate_non_empty_string("key", &self.credentials.api_key)?;
        validation::validate_date_range("date_range", &self.date_range)?;

        // 驗證S3 bucket名稱
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_aws_region("s3_region", &self.s3_region)?;
        validation::validate_non_empty_string("container", &self.container)?;

        validation::validate_table_name("account_table", &self.account_table)?;
        validation::validate_table_name("transaction_table", &self.transaction_table)?;
        validation::validate_range("retry_attempts", self.retry_attempts, 1, 10)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    validation::validate_non_empty_string(field_name, bucket_name)?;

    let reason = if bucket_name.len() < 3 || bucket_name.len() > 63 {
        Some("S3 bucket name must be between 3 and 63 characters")
    } else if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        Some("S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots")
    } else if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        Some("S3 bucket name cannot start or end with a hyphen")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// Blob storage backed by one S3 bucket; blob names are object keys.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn sink_error(&self, key: &str, message: String) -> EtlError {
        EtlError::Sink {
            destination: format!("s3://{}/{}", self.bucket, key),
            message,
        }
    }
}

impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| self.sink_error(path, DisplayErrorContext(&e).to_string()))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| self.sink_error(path, e.to_string()))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| self.sink_error(path, DisplayErrorContext(&e).to_string()))?;

        tracing::debug!("Uploaded {} bytes to s3://{}/{}", data.len(), self.bucket, path);
        Ok(())
    }
}
