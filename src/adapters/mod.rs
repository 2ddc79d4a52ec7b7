// Adapters layer: concrete implementations for the upstream API and the destination sinks.

pub mod http;
pub mod sink;

pub use http::{HttpLedgerClient, HttpLedgerSession};
pub use sink::{DelimitedFileSink, SqliteTableSink};
