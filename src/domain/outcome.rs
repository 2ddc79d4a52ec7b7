use crate::domain::table::Table;
use serde::Serialize;

pub const NO_DATA_MESSAGE: &str = "The search criteria matches no rows from source";
pub const MISMATCH_MESSAGE: &str = "Unexpected error occurred. Keys not found in source";

/// Diagnostic for upstream records that lack keys the unpivot needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub missing_keys: Vec<String>,
}

impl SchemaMismatch {
    pub fn new(missing_keys: Vec<String>) -> Self {
        Self { missing_keys }
    }

    pub fn error_text(&self) -> String {
        format!("The following keys are missing {:?}", self.missing_keys)
    }
}

/// Final state of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Table(Table),
    /// Nothing matched upstream and nothing should be written.
    NoData,
    SchemaMismatch(SchemaMismatch),
}

/// 回傳給呼叫端的結構化結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LoadResponse {
    Written {
        row_count: usize,
        destination: String,
        message: String,
    },
    NoData {
        row_count: usize,
        destination: String,
        message: String,
    },
    SchemaMismatch {
        message: String,
        error: String,
    },
}

impl LoadResponse {
    pub fn written(row_count: usize, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        if row_count == 0 {
            return Self::no_data(destination);
        }
        Self::Written {
            row_count,
            message: format!("{} rows written to {}", row_count, destination),
            destination,
        }
    }

    pub fn no_data(destination: impl Into<String>) -> Self {
        Self::NoData {
            row_count: 0,
            destination: destination.into(),
            message: NO_DATA_MESSAGE.to_string(),
        }
    }

    pub fn schema_mismatch(mismatch: &SchemaMismatch) -> Self {
        Self::SchemaMismatch {
            message: MISMATCH_MESSAGE.to_string(),
            error: mismatch.error_text(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            LoadResponse::Written { row_count, .. } | LoadResponse::NoData { row_count, .. } => {
                *row_count
            }
            LoadResponse::SchemaMismatch { .. } => 0,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LoadResponse::Written { message, .. }
            | LoadResponse::NoData { message, .. }
            | LoadResponse::SchemaMismatch { message, .. } => message,
        }
    }
}
