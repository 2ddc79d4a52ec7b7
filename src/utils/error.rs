use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Upstream API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Identity enumeration failed: {source}")]
    IdentityEnumeration {
        #[source]
        source: Box<EtlError>,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cannot cast column '{column}' value {value} to {target}")]
    TypeCoercion {
        column: String,
        value: String,
        target: String,
    },

    #[error("Sink write failed for '{destination}': {message}")]
    Sink {
        destination: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Data,
    Sink,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::Upstream { .. }
            | EtlError::IdentityEnumeration { .. }
            | EtlError::SerializationError(_) => ErrorCategory::Upstream,
            EtlError::TypeCoercion { .. } => ErrorCategory::Data,
            EtlError::CsvError(_)
            | EtlError::DatabaseError(_)
            | EtlError::IoError(_)
            | EtlError::Sink { .. } => ErrorCategory::Sink,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 重試已用盡，重新執行可能成功
            ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Sink | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::IdentityEnumeration { .. } => {
                "Check the API credentials; the identity list could not be retrieved"
            }
            EtlError::Upstream { status, .. } if *status == 401 || *status == 403 => {
                "Check username, password and API key"
            }
            EtlError::ApiError(_) | EtlError::Upstream { .. } | EtlError::SerializationError(_) => {
                "The upstream API kept failing; try again later or raise the retry count"
            }
            EtlError::TypeCoercion { .. } => {
                "The source returned a value that does not match the declared column type"
            }
            EtlError::CsvError(_)
            | EtlError::DatabaseError(_)
            | EtlError::IoError(_)
            | EtlError::Sink { .. } => "Check that the destination exists and is writable",
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Fix the configuration file or command-line arguments"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Upstream => format!("Could not fetch data from the ledger API: {}", self),
            ErrorCategory::Data => format!("Source data could not be normalized: {}", self),
            ErrorCategory::Sink => format!("Writing to the destination failed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_failure_is_upstream_category() {
        let err = EtlError::IdentityEnumeration {
            source: Box::new(EtlError::Upstream {
                status: 500,
                message: "boom".to_string(),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_auth_status_gets_credential_hint() {
        let err = EtlError::Upstream {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(err.recovery_suggestion().contains("API key"));
    }

    #[test]
    fn test_sink_errors_are_critical() {
        let err = EtlError::Sink {
            destination: "24SO_Account".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("Writing to the destination failed"));
    }
}
