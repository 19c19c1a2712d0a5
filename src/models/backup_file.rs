use chrono::{DateTime, Local};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BackupFile {
    pub path: PathBuf,
    pub last_accessed: DateTime<Local>,
}
