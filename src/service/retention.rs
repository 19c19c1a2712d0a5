use crate::models::backup_file::BackupFile;
use crate::models::error::{BackupError, Result};
use crate::models::outcome::PruneOutcome;
use crate::utils::directory::get_files_in_dir;
use chrono::{DateTime, Duration, Local};
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Non-aged files that must remain after a prune.
const MIN_RECENT_FILES: usize = 2;

#[derive(Debug)]
pub struct RetentionPlan {
    pub total: usize,
    pub aged: Vec<BackupFile>,
}

impl RetentionPlan {
    /// Aged files are only removed when at least two other files stay.
    pub fn allows_deletion(&self) -> bool {
        self.total >= self.aged.len() + MIN_RECENT_FILES
    }
}

/// `None` when the window reaches past the earliest representable date,
/// in which case no file can be old enough to expire.
pub fn retention_cutoff(now: DateTime<Local>, retention_days: u32) -> Option<DateTime<Local>> {
    Duration::try_days(i64::from(retention_days)).and_then(|window| now.checked_sub_signed(window))
}

pub fn collect_backup_files(dir: &Path) -> Result<Vec<BackupFile>> {
    get_files_in_dir(dir)?
        .into_iter()
        .map(|path| {
            let metadata = fs::metadata(&path).map_err(|cause| BackupError::MetadataError {
                path: path.clone(),
                cause,
            })?;
            let accessed = metadata
                .accessed()
                .map_err(|cause| BackupError::AccessTimeError {
                    path: path.clone(),
                    cause,
                })?;
            Ok(BackupFile {
                path,
                last_accessed: DateTime::<Local>::from(accessed),
            })
        })
        .collect()
}

pub fn plan_retention(files: Vec<BackupFile>, cutoff: Option<DateTime<Local>>) -> RetentionPlan {
    let total = files.len();
    let aged = files
        .into_iter()
        .filter(|file| cutoff.is_some_and(|cutoff| file.last_accessed < cutoff))
        .collect();
    RetentionPlan { total, aged }
}

/// Deletes files in `dir` last accessed before the retention window,
/// subject to [`RetentionPlan::allows_deletion`].
pub fn prune_directory(
    dir: &Path,
    retention_days: u32,
    now: DateTime<Local>,
) -> Result<PruneOutcome> {
    let cutoff = retention_cutoff(now, retention_days);
    let plan = plan_retention(collect_backup_files(dir)?, cutoff);
    debug!(
        "{}: {} files, {} last accessed before {}",
        dir.display(),
        plan.total,
        plan.aged.len(),
        cutoff
            .map(|c| c.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "the earliest representable date".to_string())
    );

    if !plan.allows_deletion() {
        if !plan.aged.is_empty() {
            info!(
                "Keeping {} expired backups in {}: only {} files present",
                plan.aged.len(),
                dir.display(),
                plan.total
            );
        }
        return Ok(PruneOutcome::Skipped {
            total: plan.total,
            aged: plan.aged.len(),
        });
    }

    for file in &plan.aged {
        fs::remove_file(&file.path).map_err(|cause| BackupError::FileDelete {
            path: file.path.clone(),
            cause,
        })?;
        info!("Deleted expired backup {}", file.path.display());
    }

    Ok(PruneOutcome::Deleted {
        total: plan.total,
        deleted: plan.aged.len(),
    })
}
