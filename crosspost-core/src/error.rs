use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Already processed: {post_id}")]
    DuplicatePost { post_id: String },

    #[error("Unsupported media type '{media_type}' for post {post_id}")]
    UnsupportedType { post_id: String, media_type: String },

    #[error("Media acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Post {post_id} has no media URL")]
    MissingUrl { post_id: String },

    #[error("Media request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Media origin returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Downloaded file too small: {bytes} bytes (minimum {min_bytes})")]
    TooSmall { bytes: u64, min_bytes: u64 },

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client setup failed: {reason}")]
    ClientSetup { reason: String },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Only video and image uploads are supported: {path}")]
    UnsupportedMedia { path: String },

    #[error("No destination configured for {kind} uploads")]
    NoDestination { kind: String },

    #[error("Destination rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid destination response: {details}")]
    InvalidResponse { details: String },

    #[error("Cannot read media file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Corrupt row for post {post_id}: {details}")]
    CorruptRow { post_id: String, details: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
