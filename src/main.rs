use clap::Parser;
use std::sync::Arc;
use tenant_ledger_etl::config::{Command, SinkKind};
use tenant_ledger_etl::core::{ConfigProvider, TableSink};
use tenant_ledger_etl::domain::model::RecordType;
use tenant_ledger_etl::domain::outcome::LoadResponse;
use tenant_ledger_etl::utils::error::{ErrorSeverity, EtlError};
use tenant_ledger_etl::utils::{logger, validation::Validate};
use tenant_ledger_etl::{
    CliConfig, DelimitedFileSink, EtlEngine, HttpLedgerClient, LedgerPipeline, LocalStorage,
    SqliteTableSink, TomlConfig,
};

fn record_types(command: &Command) -> &'static [RecordType] {
    match command {
        Command::Accounts => &[RecordType::Accounts],
        Command::Transactions { .. } => &[RecordType::Transactions],
        Command::All { .. } => &[RecordType::Accounts, RecordType::Transactions],
    }
}

async fn run_all<K: TableSink>(
    config: Arc<TomlConfig>,
    sink: Arc<K>,
    record_types: &[RecordType],
) -> tenant_ledger_etl::Result<Vec<LoadResponse>> {
    let api = Arc::new(HttpLedgerClient::new(
        config.api_endpoint(),
        config.request_timeout_seconds(),
    ));
    let monitor_enabled = config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut responses = Vec::with_capacity(record_types.len());
    for record_type in record_types {
        let pipeline =
            LedgerPipeline::new(api.clone(), sink.clone(), config.clone(), *record_type);
        let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
        let response = engine.run().await?;
        tracing::info!("✅ {}", response.message());
        responses.push(response);
    }
    Ok(responses)
}

async fn execute(cli: &CliConfig) -> tenant_ledger_etl::Result<Vec<LoadResponse>> {
    let config = cli.resolve()?;
    config.validate()?;
    tracing::debug!("Resolved config: {:?}", config);

    let record_types = record_types(&cli.command);
    let config = Arc::new(config);

    match config.load.sink {
        SinkKind::File => {
            let storage = LocalStorage::new(config.output_path().to_string());
            let sink = Arc::new(DelimitedFileSink::new(storage, config.container()));
            run_all(config, sink, record_types).await
        }
        SinkKind::Sqlite => {
            let path = config.load.database_path.clone().ok_or_else(|| {
                EtlError::MissingConfigError {
                    field: "load.database_path".to_string(),
                }
            })?;
            let sink = Arc::new(SqliteTableSink::open(path)?);
            run_all(config, sink, record_types).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting ledger-etl");

    match execute(&cli).await {
        Ok(responses) => {
            for response in &responses {
                println!("{}", serde_json::to_string(response)?);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
