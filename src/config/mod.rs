pub mod cli;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod toml_config;

pub use cli::LocalStorage;
pub use toml_config::{SinkKind, TomlConfig};

#[cfg(feature = "cli")]
pub use args::{CliConfig, Command};

#[cfg(feature = "cli")]
mod args {
    use super::toml_config::{SinkKind, TomlConfig};
    use crate::utils::error::Result;
    use crate::utils::validation;
    use chrono::NaiveDate;
    use clap::{Parser, Subcommand};

    #[derive(Debug, Clone, Parser)]
    #[command(name = "ledger-etl")]
    #[command(about = "Load accounts and transactions from every client of a multi-tenant ledger")]
    pub struct CliConfig {
        /// Path to TOML configuration file
        #[arg(short, long)]
        pub config: Option<String>,

        /// Ledger API base URL (overrides config)
        #[arg(long)]
        pub endpoint: Option<String>,

        #[arg(long)]
        pub uid: Option<String>,

        #[arg(long)]
        pub pwd: Option<String>,

        #[arg(long)]
        pub key: Option<String>,

        #[arg(long)]
        pub output_path: Option<String>,

        #[arg(long, value_enum)]
        pub sink: Option<SinkKind>,

        #[arg(long)]
        pub database_path: Option<String>,

        /// Attempts per client before the run fails
        #[arg(long)]
        pub retries: Option<u32>,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log per-phase timing and memory")]
        pub monitor: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Load the chart of accounts
        Accounts,
        /// Load transactions, optionally limited to a date range
        Transactions {
            #[arg(long)]
            start_date: Option<NaiveDate>,
            #[arg(long)]
            end_date: Option<NaiveDate>,
        },
        /// Load accounts, then transactions
        All {
            #[arg(long)]
            start_date: Option<NaiveDate>,
            #[arg(long)]
            end_date: Option<NaiveDate>,
        },
    }

    impl CliConfig {
        /// 讀取設定檔（若有），再套用命令列覆蓋
        pub fn resolve(&self) -> Result<TomlConfig> {
            let mut config = match &self.config {
                Some(path) => TomlConfig::from_file(path)?,
                None => {
                    validation::validate_required_field("--endpoint", &self.endpoint)?;
                    TomlConfig::default()
                }
            };

            if let Some(endpoint) = &self.endpoint {
                config.source.endpoint = endpoint.clone();
            }
            if let Some(uid) = &self.uid {
                config.credentials.username = uid.clone();
            }
            if let Some(pwd) = &self.pwd {
                config.credentials.password = pwd.clone();
            }
            if let Some(key) = &self.key {
                config.credentials.api_key = key.clone();
            }
            if let Some(output_path) = &self.output_path {
                config.load.output_path = output_path.clone();
            }
            if let Some(sink) = self.sink {
                config.load.sink = sink;
            }
            if let Some(database_path) = &self.database_path {
                config.load.database_path = Some(database_path.clone());
            }
            if let Some(retries) = self.retries {
                config.source.retry_attempts = Some(retries);
            }

            match &self.command {
                Command::Accounts => {}
                Command::Transactions {
                    start_date,
                    end_date,
                }
                | Command::All {
                    start_date,
                    end_date,
                } => {
                    if start_date.is_some() {
                        config.transactions.date_start = *start_date;
                    }
                    if end_date.is_some() {
                        config.transactions.date_end = *end_date;
                    }
                }
            }

            if self.monitor {
                config.monitoring = Some(super::toml_config::MonitoringConfig { enabled: true });
            }

            Ok(config)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::ConfigProvider;
        use crate::domain::model::RecordType;
        use crate::utils::validation::Validate;

        #[test]
        fn test_args_without_config_file() {
            let cli = CliConfig::parse_from([
                "ledger-etl",
                "--endpoint",
                "https://api.example.com",
                "--uid",
                "u",
                "--pwd",
                "p",
                "--key",
                "k",
                "transactions",
                "--start-date",
                "2024-01-01",
            ]);

            let config = cli.resolve().unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.credentials().username, "u");
            assert_eq!(config.date_range().start, NaiveDate::from_ymd_opt(2024, 1, 1));
            assert_eq!(config.date_range().end, None);
            assert_eq!(config.destination_for(RecordType::Transactions), "24SO_Transaction");
        }

        #[test]
        fn test_missing_endpoint_without_config_file() {
            let cli = CliConfig::parse_from(["ledger-etl", "accounts"]);
            assert!(cli.resolve().is_err());
        }

        #[test]
        fn test_sink_override() {
            let cli = CliConfig::parse_from([
                "ledger-etl",
                "--endpoint",
                "https://api.example.com",
                "--sink",
                "sqlite",
                "--database-path",
                "ledger.db",
                "--retries",
                "5",
                "all",
            ]);
            let config = cli.resolve().unwrap();
            assert_eq!(config.load.sink, SinkKind::Sqlite);
            assert_eq!(config.load.database_path.as_deref(), Some("ledger.db"));
            assert_eq!(config.retry_attempts(), 5);
        }
    }
}
