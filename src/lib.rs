pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LocalStorage, TomlConfig};

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use adapters::{DelimitedFileSink, HttpLedgerClient, SqliteTableSink};
pub use core::{etl::EtlEngine, pipeline::LedgerPipeline};
pub use utils::error::{EtlError, Result};
