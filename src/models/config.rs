use crate::models::error::{BackupError, Result};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const DEFAULT_PG_DUMP: &str = r"C:\Program Files\PostgreSQL\12\bin\pg_dump.exe";
#[cfg(not(windows))]
const DEFAULT_PG_DUMP: &str = "/usr/bin/pg_dump";

/// Values shared by every database in one invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retention_days: u32,
    pub user: String,
    pub host: String,
    pub port: u16,
    pub event_source: String,
    pub pg_dump_path: PathBuf,
    pub backup_root: PathBuf,
    pub event_log_file: String,
    pub schedule: Option<String>,
    pub run_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            retention_days: 14,
            user: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            event_source: "Postgres Backup".to_string(),
            pg_dump_path: PathBuf::from(DEFAULT_PG_DUMP),
            backup_root: PathBuf::from("."),
            event_log_file: "backup_events.db".to_string(),
            schedule: None,
            run_on_startup: true,
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct SettingsOverrides {
    pub retention_days: Option<u32>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub event_source: Option<String>,
    pub pg_dump_path: Option<PathBuf>,
    pub backup_root: Option<PathBuf>,
    pub event_log_file: Option<String>,
    pub schedule: Option<String>,
}

impl Settings {
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(retention_days) = overrides.retention_days {
            self.retention_days = retention_days;
        }
        if let Some(user) = overrides.user {
            self.user = user;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(event_source) = overrides.event_source {
            self.event_source = event_source;
        }
        if let Some(pg_dump_path) = overrides.pg_dump_path {
            self.pg_dump_path = pg_dump_path;
        }
        if let Some(backup_root) = overrides.backup_root {
            self.backup_root = backup_root;
        }
        if let Some(event_log_file) = overrides.event_log_file {
            self.event_log_file = event_log_file;
        }
        if overrides.schedule.is_some() {
            self.schedule = overrides.schedule;
        }
    }
}

/// Loads settings from an optional JSON file, falling back to defaults.
pub fn setup_settings(config_file: Option<&Path>) -> Result<Settings> {
    let Some(config_path) = config_file else {
        return Ok(Settings::default());
    };
    info!("Loading config from: {}", config_path.display());

    let config_str =
        fs::read_to_string(config_path).map_err(|cause| BackupError::ConfigRead {
            path: config_path.to_path_buf(),
            cause,
        })?;

    serde_json::from_str(&config_str).map_err(|cause| BackupError::ConfigParse {
        path: config_path.to_path_buf(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = setup_settings(None).unwrap();

        assert_eq!(settings.retention_days, 14);
        assert_eq!(settings.user, "postgres");
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
        assert_eq!(settings.event_source, "Postgres Backup");
        assert_eq!(settings.backup_root, PathBuf::from("."));
        assert!(settings.schedule.is_none());
        assert!(settings.run_on_startup);
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let config_content = r#"{
            "retention_days": 30,
            "host": "db.internal",
            "schedule": "0 30 2 * * *"
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let settings = setup_settings(Some(temp_file.path())).unwrap();

        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.host, "db.internal");
        assert_eq!(settings.schedule.as_deref(), Some("0 30 2 * * *"));
        assert_eq!(settings.user, "postgres"); // default
        assert_eq!(settings.port, 5432); // default
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut settings = Settings {
            retention_days: 30,
            host: "db.internal".to_string(),
            ..Settings::default()
        };

        settings.apply(SettingsOverrides {
            retention_days: Some(7),
            port: Some(6543),
            ..SettingsOverrides::default()
        });

        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.port, 6543);
        assert_eq!(settings.host, "db.internal");
    }

    #[test]
    fn test_error_on_missing_config_file() {
        let result = setup_settings(Some(Path::new("/this/does/not/exist/config.json")));

        match result {
            Err(BackupError::ConfigRead { .. }) => {}
            other => panic!("Expected ConfigRead error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_on_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{ "retention_days": "fourteen" }"#)
            .unwrap();
        temp_file.flush().unwrap();

        let result = setup_settings(Some(temp_file.path()));

        match result {
            Err(BackupError::ConfigParse { .. }) => {}
            other => panic!("Expected ConfigParse error, got {:?}", other),
        }
    }
}
