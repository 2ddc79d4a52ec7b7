pub mod aggregator;
pub mod coercion;
pub mod dimensions;
pub mod etl;
pub mod fetcher;
pub mod flatten;
pub mod naming;
pub mod pipeline;

pub use crate::domain::model::{AggregatedResult, Record};
pub use crate::domain::outcome::{LoadResponse, PipelineOutcome};
pub use crate::domain::ports::{
    ConfigProvider, LedgerApi, LedgerSession, Pipeline, Storage, TableSink,
};
pub use crate::utils::error::Result;
