use crate::adapters::sink::DEFAULT_CONTAINER;
use crate::core::ConfigProvider;
use crate::core::fetcher::DEFAULT_RETRIES;
use crate::domain::model::{Credentials, DateRange, RecordType};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ACCOUNT_TABLE: &str = "24SO_Account";
pub const DEFAULT_TRANSACTION_TABLE: &str = "24SO_Transaction";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub transactions: TransactionsConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionsConfig {
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

/// 目的地種類：分隔文字檔（blob）或關聯式資料表
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    pub container: Option<String>,
    pub database_path: Option<String>,
    pub account_table: Option<String>,
    pub transaction_table: Option<String>,
}

fn default_output_path() -> String {
    "./output".to_string()
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            output_path: default_output_path(),
            container: None,
            database_path: None,
            account_table: None,
            transaction_table: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LEDGER_API_KEY})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("source.endpoint", &self.source.endpoint)?;

        validation::validate_non_empty_string("credentials.username", &self.credentials.username)?;
        validation::validate_non_empty_string("credentials.password", &self.credentials.password)?;
        validation::validate_non_empty_string("credentials.api_key", &self.credentials.api_key)?;

        if let Some(retries) = self.source.retry_attempts {
            validation::validate_range("source.retry_attempts", retries, 1, 10)?;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            validation::validate_positive_number("source.timeout_seconds", timeout as usize, 1)?;
        }

        validation::validate_date_range("transactions", &self.date_range())?;

        validation::validate_table_name(
            "load.account_table",
            self.destination_for(RecordType::Accounts),
        )?;
        validation::validate_table_name(
            "load.transaction_table",
            self.destination_for(RecordType::Transactions),
        )?;

        match self.load.sink {
            SinkKind::File => {
                validation::validate_path("load.output_path", &self.load.output_path)?;
                validation::validate_non_empty_string("load.container", self.container())?;
            }
            SinkKind::Sqlite => {
                let db = validation::validate_required_field(
                    "load.database_path",
                    &self.load.database_path,
                )?;
                validation::validate_path("load.database_path", db)?;
            }
        }

        Ok(())
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn api_endpoint(&self) -> &str {
        &self.source.endpoint
    }

    fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn retry_attempts(&self) -> u32 {
        self.source.retry_attempts.unwrap_or(DEFAULT_RETRIES)
    }

    fn request_timeout_seconds(&self) -> u64 {
        self.source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn date_range(&self) -> DateRange {
        DateRange::new(self.transactions.date_start, self.transactions.date_end)
    }

    fn container(&self) -> &str {
        self.load.container.as_deref().unwrap_or(DEFAULT_CONTAINER)
    }

    fn destination_for(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::Accounts => self
                .load
                .account_table
                .as_deref()
                .unwrap_or(DEFAULT_ACCOUNT_TABLE),
            RecordType::Transactions => self
                .load
                .transaction_table
                .as_deref()
                .unwrap_or(DEFAULT_TRANSACTION_TABLE),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
