use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn error_code(&self) -> String;

    /// Errors that must stop the whole run rather than a single post.
    fn is_fatal(&self) -> bool {
        false
    }
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Acquisition(e) => {
                error!("Acquisition error details: {:?}", e);
            }
            CoreError::Publish(e) => {
                error!("Publish error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Acquisition(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            CoreError::Publish(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::DuplicatePost { .. } => "DUPLICATE_POST".to_string(),
            CoreError::UnsupportedType { .. } => "UNSUPPORTED_TYPE".to_string(),
            CoreError::Acquisition(_) => "ACQUISITION".to_string(),
            CoreError::Publish(_) => "PUBLISH".to_string(),
            CoreError::Database(_) => "DATABASE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
        }
    }

    fn is_fatal(&self) -> bool {
        match self {
            CoreError::Database(e) => e.is_fatal(),
            CoreError::Config(_) => true,
            _ => false,
        }
    }
}

impl ErrorExt for AcquisitionError {
    fn log_error(&self) -> &Self {
        error!("AcquisitionError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AcquisitionError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AcquisitionError::MissingUrl { .. } | AcquisitionError::ClientSetup { .. }
        )
    }

    fn error_code(&self) -> String {
        match self {
            AcquisitionError::MissingUrl { .. } => "ACQUIRE_MISSING_URL".to_string(),
            AcquisitionError::Request { source, .. } if source.is_timeout() => {
                "ACQUIRE_TIMEOUT".to_string()
            }
            AcquisitionError::Request { .. } => "ACQUIRE_REQUEST".to_string(),
            AcquisitionError::HttpStatus { .. } => "ACQUIRE_HTTP_STATUS".to_string(),
            AcquisitionError::TooSmall { .. } => "ACQUIRE_TOO_SMALL".to_string(),
            AcquisitionError::Io(_) => "ACQUIRE_IO".to_string(),
            AcquisitionError::ClientSetup { .. } => "ACQUIRE_CLIENT_SETUP".to_string(),
        }
    }
}

impl ErrorExt for PublishError {
    fn log_error(&self) -> &Self {
        error!("PublishError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("PublishError (warning): {}", self);
        self
    }

    // A failed publish is terminal for the post.
    fn is_retryable(&self) -> bool {
        false
    }

    fn error_code(&self) -> String {
        match self {
            PublishError::UnsupportedMedia { .. } => "PUBLISH_UNSUPPORTED_MEDIA".to_string(),
            PublishError::NoDestination { .. } => "PUBLISH_NO_DESTINATION".to_string(),
            PublishError::Rejected { .. } => "PUBLISH_REJECTED".to_string(),
            PublishError::Request(_) => "PUBLISH_REQUEST".to_string(),
            PublishError::InvalidResponse { .. } => "PUBLISH_INVALID_RESPONSE".to_string(),
            PublishError::Io(_) => "PUBLISH_IO".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!("DatabaseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DatabaseError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::DatabaseLocked)
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::CorruptRow { .. } => "DB_CORRUPT_ROW".to_string(),
            DatabaseError::DatabaseLocked => "DB_LOCKED".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }

    // No post may be processed without durable dedup state.
    fn is_fatal(&self) -> bool {
        true
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }

    fn is_fatal(&self) -> bool {
        true
    }
}
