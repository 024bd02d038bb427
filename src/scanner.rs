use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ScanError;

/// List the image files directly inside `dir`, sorted by file name.
///
/// Only direct children are considered, so the backup directory created by
/// an earlier run is never rescanned.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.exists() {
        return Err(ScanError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let allowed: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if allowed.contains(&ext.to_lowercase()) {
                images.push(path.to_path_buf());
            }
        }
    }

    log::info!("Found {} image(s) in {}", images.len(), dir.display());
    Ok(images)
}
