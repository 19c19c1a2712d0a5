use crate::models::config::Settings;
use crate::models::error::{BackupError, Result};
use crate::models::event::EventKind;
use crate::models::outcome::{DatabaseOutcome, DumpOutcome};
use crate::service::dump::{archive_file_name, DumpRequest, DumpTool};
use crate::service::event_log::{record_event, EventLog};
use crate::service::retention::prune_directory;
use crate::utils::progress::format_bytes;
use chrono::{DateTime, Local};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// The collaborators one backup run works against.
pub struct BackupContext<'a> {
    pub settings: &'a Settings,
    pub event_log: &'a dyn EventLog,
    pub dump_tool: &'a dyn DumpTool,
}

/// Backs up each database in the order given. Duplicates are processed
/// again. A failed dump is recorded and the run moves on; directory and
/// prune errors stop the run.
pub fn run_backups(
    ctx: &BackupContext,
    databases: &[String],
    progress: Option<&ProgressBar>,
) -> Result<Vec<DatabaseOutcome>> {
    let mut outcomes = Vec::with_capacity(databases.len());

    for database in databases {
        if let Some(pb) = progress {
            pb.set_message(database.clone());
        }

        outcomes.push(backup_database(ctx, database, Local::now())?);

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(outcomes)
}

pub fn backup_database(
    ctx: &BackupContext,
    database: &str,
    now: DateTime<Local>,
) -> Result<DatabaseOutcome> {
    let settings = ctx.settings;
    let backup_dir = settings.backup_root.join(database);

    let directory_created = ensure_backup_dir(ctx, &backup_dir)?;
    let dump = run_dump(ctx, database, &backup_dir, now)?;
    let prune = prune_directory(&backup_dir, settings.retention_days, now)?;

    Ok(DatabaseOutcome {
        database: database.to_string(),
        directory_created,
        dump,
        prune,
    })
}

fn ensure_backup_dir(ctx: &BackupContext, backup_dir: &Path) -> Result<bool> {
    if backup_dir.exists() {
        return Ok(false);
    }

    fs::create_dir_all(backup_dir).map_err(|cause| BackupError::DirectoryCreate {
        path: backup_dir.to_path_buf(),
        cause,
    })?;
    let resolved = std::path::absolute(backup_dir).map_err(|cause| BackupError::MetadataError {
        path: backup_dir.to_path_buf(),
        cause,
    })?;

    record_event(
        ctx.event_log,
        EventKind::DirectoryCreated,
        &ctx.settings.event_source,
        format!("Created backup directory {}", resolved.display()),
    )?;
    Ok(true)
}

fn run_dump(
    ctx: &BackupContext,
    database: &str,
    backup_dir: &Path,
    now: DateTime<Local>,
) -> Result<DumpOutcome> {
    let settings = ctx.settings;
    let archive: PathBuf = backup_dir.join(archive_file_name(database, now));
    let request = DumpRequest {
        database,
        archive: &archive,
        host: &settings.host,
        port: settings.port,
        user: &settings.user,
    };

    info!("Dumping {} to {}", database, archive.display());

    match ctx.dump_tool.dump(&request) {
        Ok(exit_code) => {
            // A started process counts as a successful backup whatever it
            // exits with. See DESIGN.md before changing this.
            if exit_code != Some(0) {
                warn!(
                    "Dump of {} exited with {:?}; recording it as succeeded",
                    database, exit_code
                );
            }
            match fs::metadata(&archive) {
                Ok(metadata) => info!(
                    "Archive {} is {}",
                    archive.display(),
                    format_bytes(metadata.len())
                ),
                Err(_) => debug!("No archive found at {}", archive.display()),
            }

            record_event(
                ctx.event_log,
                EventKind::BackupSucceeded,
                &settings.event_source,
                format!("Backup of database {} completed", database),
            )?;
            Ok(DumpOutcome::Completed { archive, exit_code })
        }
        Err(e) => {
            let detail = e.to_string();
            record_event(
                ctx.event_log,
                EventKind::BackupFailed,
                &settings.event_source,
                format!("Backup of database {} failed: {}", database, detail),
            )?;
            Ok(DumpOutcome::Failed { detail })
        }
    }
}
