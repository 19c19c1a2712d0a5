use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to read config file '{path}': {cause}")]
    ConfigRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse config file '{path}': {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create backup directory '{path}': {cause}")]
    DirectoryCreate { path: PathBuf, cause: io::Error },

    #[error("Failed to read directory '{path}': {cause}")]
    DirectoryRead { path: PathBuf, cause: walkdir::Error },

    #[error("Failed to get metadata for '{path}': {cause}")]
    MetadataError { path: PathBuf, cause: io::Error },

    #[error("Last access time is unavailable for '{path}': {cause}")]
    AccessTimeError { path: PathBuf, cause: io::Error },

    #[error("Failed to delete expired backup '{path}': {cause}")]
    FileDelete { path: PathBuf, cause: io::Error },

    #[error("Failed to open event log '{path}': {cause}")]
    EventLogPool { path: String, cause: r2d2::Error },

    #[error("Event log query failed for '{operation}': {cause}")]
    EventLogQuery {
        operation: String,
        cause: rusqlite::Error,
    },

    #[error("Failed to write event {event_id} for source '{source_name}': {cause}")]
    EventLogInsert {
        event_id: u32,
        source_name: String,
        cause: rusqlite::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackupError>;
