use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use chrono::NaiveDate;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use std::sync::Arc;
use tenant_ledger_etl::adapters::{DelimitedFileSink, HttpLedgerClient};
use tenant_ledger_etl::config::lambda::{LambdaConfig, S3Storage};
use tenant_ledger_etl::core::ConfigProvider;
use tenant_ledger_etl::domain::model::{DateRange, RecordType};
use tenant_ledger_etl::domain::outcome::LoadResponse;
use tenant_ledger_etl::utils::{logger, validation::Validate};
use tenant_ledger_etl::{EtlEngine, LedgerPipeline};

#[derive(Deserialize)]
pub struct Request {
    pub record_type: RecordType,
    pub uid: Option<String>,
    pub pwd: Option<String>,
    pub key: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn apply_request(config: &mut LambdaConfig, request: &Request) {
    if let Some(uid) = &request.uid {
        config.credentials.username = uid.clone();
    }
    if let Some(pwd) = &request.pwd {
        config.credentials.password = pwd.clone();
    }
    if let Some(key) = &request.key {
        config.credentials.api_key = key.clone();
    }
    config.date_range = DateRange::new(request.start_date, request.end_date);
}

async fn function_handler(event: LambdaEvent<Request>) -> Result<LoadResponse, Error> {
    let request = event.payload;
    tracing::info!("🚀 Lambda invoked for {}", request.record_type);

    let mut lambda_config = LambdaConfig::from_env()?;
    apply_request(&mut lambda_config, &request);
    if let Err(e) = lambda_config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e.into());
    }

    // 創建AWS配置和S3客戶端
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws)
        .region(Region::new(lambda_config.s3_region.clone()))
        .force_path_style(true)
        .build();
    let storage = S3Storage::new(
        S3Client::from_conf(s3_config),
        lambda_config.s3_bucket.clone(),
    );

    let api = Arc::new(HttpLedgerClient::new(
        lambda_config.api_endpoint(),
        lambda_config.request_timeout_seconds(),
    ));
    let sink = Arc::new(DelimitedFileSink::new(storage, lambda_config.container()));
    let pipeline = LedgerPipeline::new(api, sink, Arc::new(lambda_config), request.record_type);

    match EtlEngine::new(pipeline).run().await {
        Ok(response) => {
            tracing::info!("✅ {}", response.message());
            Ok(response)
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
