use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Token signing error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Authentication with {service} failed: {message}")]
    AuthError { service: String, message: String },

    #[error("Query failed with status {status}: {message}")]
    QueryError { status: u16, message: String },

    #[error("Schema error: field '{field}' not found in {context}")]
    SchemaError { field: String, context: String },

    #[error("Publishing to sheet '{sheet}' failed: {message}")]
    PublishError { sheet: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Authentication,
    Data,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 下次排程執行可能自行恢復
    Medium,
    /// 需要人工處理的資料或設定問題
    High,
    /// 環境或憑證問題
    Critical,
}

impl ErrorSeverity {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_) | EtlError::QueryError { .. } => ErrorCategory::Network,
            EtlError::AuthError { .. } | EtlError::TokenError(_) => ErrorCategory::Authentication,
            EtlError::SerializationError(_)
            | EtlError::SchemaError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::CsvError(_) | EtlError::IoError(_) | EtlError::PublishError { .. } => {
                ErrorCategory::Output
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Output => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Authentication => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::MissingConfigError { .. } => {
                "Add the missing key to the JSON configuration file"
            }
            EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::ConfigError { .. } => "Check the configuration file against config.example.json",
            EtlError::ValidationError { .. } => {
                "Pass both dates as YYYY-MM-DD with start <= end, or none at all"
            }
            EtlError::AuthError { .. } | EtlError::TokenError(_) => {
                "Verify the Metabase credentials and the service-account key file"
            }
            EtlError::ApiError(_) => "Check network connectivity to Metabase and Google APIs",
            EtlError::QueryError { .. } => {
                "Check that the Metabase question exists and accepts start_date/end_date"
            }
            EtlError::SchemaError { .. } => {
                "The Metabase question no longer returns an expected column; update the query"
            }
            EtlError::PublishError { .. } => {
                "Check that the service account has edit access to the spreadsheet"
            }
            EtlError::IoError(_) | EtlError::CsvError(_) => {
                "Check that the output directory exists and is writable"
            }
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                "Inspect the upstream response; it did not match the expected JSON shape"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not fetch report data: {}", self),
            ErrorCategory::Authentication => format!("Authentication failed: {}", self),
            ErrorCategory::Data => format!("Unexpected report data: {}", self),
            ErrorCategory::Output => format!("Could not publish results: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
