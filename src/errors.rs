use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Settings file not found: {}", .0.display())]
    SettingsNotFound(PathBuf),

    #[error("Settings file {} is malformed: {reason}", .path.display())]
    SettingsParse { path: PathBuf, reason: String },

    #[error("Setting '{0}' is missing from settings.json")]
    MissingSetting(String),

    #[error("Invalid identifier for '{key}': {value:?}")]
    InvalidIdentifier { key: String, value: String },

    #[error("Database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Warehouse authentication failed: {0}")]
    WarehouseAuth(String),

    #[error("Warehouse query failed: {0}")]
    WarehouseQuery(String),

    #[error("Row has {found} cells but the table has {expected} columns")]
    RowShape { expected: usize, found: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Write to table '{table}' failed: {source}")]
    Write {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Upload verification failed: {0}")]
    Verification(String),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
