use crate::models::config::Settings;
use crate::models::error::{BackupError, Result};
use cron::Schedule;
use log::{info, warn};
use std::path::{Component, Path};
use std::str::FromStr;

/// A hundred years; anything longer is almost certainly a typo.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Validates the settings and the database list for one invocation.
pub fn validate_config(settings: &Settings, databases: &[String]) -> Result<()> {
    info!("Validating configuration...");

    validate_numeric_values(settings)?;
    validate_connection(settings)?;
    validate_databases(databases)?;
    validate_schedule(settings)?;

    if !settings.pg_dump_path.exists() {
        warn!(
            "Dump binary not found at {}. Every backup in this run will be reported as failed.",
            settings.pg_dump_path.display()
        );
    }

    info!("Configuration validation passed");
    Ok(())
}

fn validate_numeric_values(settings: &Settings) -> Result<()> {
    if settings.retention_days == 0 {
        return Err(BackupError::InvalidConfig(
            "retention_days must be greater than 0".to_string(),
        ));
    }

    if settings.retention_days > MAX_RETENTION_DAYS {
        return Err(BackupError::InvalidConfig(format!(
            "retention_days must be at most {} (got {})",
            MAX_RETENTION_DAYS, settings.retention_days
        )));
    }

    if settings.port == 0 {
        return Err(BackupError::InvalidConfig(
            "port must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_connection(settings: &Settings) -> Result<()> {
    if settings.user.trim().is_empty() {
        return Err(BackupError::InvalidConfig("user cannot be empty".to_string()));
    }
    if settings.host.trim().is_empty() {
        return Err(BackupError::InvalidConfig("host cannot be empty".to_string()));
    }
    if settings.event_source.trim().is_empty() {
        return Err(BackupError::InvalidConfig(
            "event_source cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Database names become directory and file names, so they must stay
/// inside the backup root.
fn validate_databases(databases: &[String]) -> Result<()> {
    if databases.is_empty() {
        return Err(BackupError::InvalidConfig(
            "At least one database must be given".to_string(),
        ));
    }

    for (idx, database) in databases.iter().enumerate() {
        if database.trim().is_empty() {
            return Err(BackupError::InvalidConfig(format!(
                "Database #{} has an empty name",
                idx + 1
            )));
        }

        if !is_plain_directory_name(database) {
            return Err(BackupError::InvalidConfig(format!(
                "Database #{} has a name that is not usable as a directory: {}",
                idx + 1,
                database
            )));
        }
    }

    Ok(())
}

/// One normal path component: no separators, no `..`, and no drive
/// prefix or root that would make `join` leave the backup root.
fn is_plain_directory_name(name: &str) -> bool {
    if name.contains(['/', '\\']) || name.contains("..") {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn validate_schedule(settings: &Settings) -> Result<()> {
    if let Some(schedule) = &settings.schedule {
        Schedule::from_str(schedule).map_err(|e| {
            BackupError::InvalidConfig(format!("Invalid cron schedule '{}': {}", schedule, e))
        })?;
    }
    Ok(())
}
