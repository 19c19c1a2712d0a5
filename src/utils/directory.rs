use crate::models::error::{BackupError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the regular files directly inside `dir`, sorted by name.
pub fn get_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|cause| BackupError::DirectoryRead {
            path: dir.to_path_buf(),
            cause,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}
