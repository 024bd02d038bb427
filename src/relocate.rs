use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::RelocateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RelocationMode {
    /// Move files into `dir`, created on demand.
    Backup { dir: PathBuf },
    /// Remove files permanently.
    Delete,
}

impl RelocationMode {
    pub fn action(&self) -> &'static str {
        match self {
            RelocationMode::Backup { .. } => "moved",
            RelocationMode::Delete => "deleted",
        }
    }
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relocation {
    pub source: PathBuf,
    /// Where the file went; `None` for deletions and failures.
    pub destination: Option<PathBuf>,
    pub error: Option<String>,
}

impl Relocation {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// First free path among `name.ext`, `name_1.ext`, `name_2.ext`, ...
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Move or delete every file in `files`.
///
/// Only failing to create the backup directory is fatal. A failure on a
/// single file is logged and recorded so the rest of the batch proceeds.
pub fn relocate(
    files: &[PathBuf],
    mode: &RelocationMode,
) -> Result<Vec<Relocation>, RelocateError> {
    if let RelocationMode::Backup { dir } = mode {
        if !files.is_empty() {
            fs::create_dir_all(dir).map_err(|source| RelocateError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
    }

    let mut outcomes = Vec::with_capacity(files.len());
    for file in files {
        let outcome = match mode {
            RelocationMode::Backup { dir } => move_into(file, dir),
            RelocationMode::Delete => fs::remove_file(file).map(|_| None).map_err(Into::into),
        };
        let relocation = match outcome {
            Ok(destination) => {
                match &destination {
                    Some(dest) => log::info!("Moved {} → {}", file.display(), dest.display()),
                    None => log::info!("Deleted {}", file.display()),
                }
                Relocation {
                    source: file.clone(),
                    destination,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("Failed to {} {}: {}", mode.action(), file.display(), e);
                Relocation {
                    source: file.clone(),
                    destination: None,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(relocation);
    }

    Ok(outcomes)
}

fn move_into(file: &Path, dir: &Path) -> Result<Option<PathBuf>, RelocateError> {
    let file_name = file.file_name().ok_or_else(|| RelocateError::NoFileName {
        path: file.to_path_buf(),
    })?;
    let dest = unique_destination(dir, file_name);

    match fs::rename(file, &dest) {
        Ok(()) => Ok(Some(dest)),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            copy_then_remove(file, &dest)?;
            Ok(Some(dest))
        }
        Err(e) => Err(e.into()),
    }
}

/// Move across filesystems. Never leaves the file in both places.
fn copy_then_remove(file: &Path, dest: &Path) -> Result<(), RelocateError> {
    fs::copy(file, dest)?;
    if let Err(e) = fs::remove_file(file) {
        if let Err(cleanup) = fs::remove_file(dest) {
            log::error!("Failed to remove partial copy {}: {}", dest.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_destination_appends_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let name = OsStr::new("shot.png");

        assert_eq!(unique_destination(dir, name), dir.join("shot.png"));
        fs::write(dir.join("shot.png"), b"1").unwrap();
        assert_eq!(unique_destination(dir, name), dir.join("shot_1.png"));
        fs::write(dir.join("shot_1.png"), b"2").unwrap();
        assert_eq!(unique_destination(dir, name), dir.join("shot_2.png"));
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("README"), b"1").unwrap();
        assert_eq!(
            unique_destination(temp_dir.path(), OsStr::new("README")),
            temp_dir.path().join("README_1")
        );
    }

    #[test]
    fn test_backup_moves_without_overwriting() {
        let temp_dir = TempDir::new().unwrap();
        let backup = temp_dir.path().join("duplicates_backup");
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("b.png"), b"from an earlier run").unwrap();

        let source = temp_dir.path().join("b.png");
        fs::write(&source, b"new").unwrap();

        let mode = RelocationMode::Backup { dir: backup.clone() };
        let outcomes = relocate(&[source.clone()], &mode).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].destination, Some(backup.join("b_1.png")));
        assert!(!source.exists());
        assert_eq!(fs::read(backup.join("b.png")).unwrap(), b"from an earlier run");
        assert_eq!(fs::read(backup.join("b_1.png")).unwrap(), b"new");
    }

    #[test]
    fn test_backup_dir_created_on_demand() {
        let temp_dir = TempDir::new().unwrap();
        let backup = temp_dir.path().join("nested").join("backup");
        let mode = RelocationMode::Backup { dir: backup.clone() };

        relocate(&[], &mode).unwrap();
        assert!(!backup.exists());

        let source = temp_dir.path().join("a.png");
        fs::write(&source, b"a").unwrap();
        relocate(&[source], &mode).unwrap();
        assert!(backup.join("a.png").exists());
    }

    #[test]
    fn test_delete_and_missing_file_failure() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("a.png");
        let missing = temp_dir.path().join("gone.png");
        fs::write(&present, b"a").unwrap();

        let outcomes = relocate(&[present.clone(), missing], &RelocationMode::Delete).unwrap();
        assert!(!present.exists());
        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].destination, None);
        assert!(!outcomes[1].succeeded());
    }

    #[test]
    fn test_backup_of_missing_file_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let backup = temp_dir.path().join("backup");
        let mode = RelocationMode::Backup { dir: backup.clone() };

        let outcomes = relocate(&[temp_dir.path().join("gone.png")], &mode).unwrap();
        assert!(!outcomes[0].succeeded());
        assert_eq!(outcomes[0].destination, None);
        assert!(!backup.join("gone.png").exists());
    }

    #[test]
    fn test_copy_then_remove_moves_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        let dest = temp_dir.path().join("b.png");
        fs::write(&source, b"a").unwrap();

        copy_then_remove(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a");
    }

    #[test]
    fn test_copy_then_remove_failure_keeps_one_copy() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        let dest = temp_dir.path().join("b.png");

        assert!(copy_then_remove(&source, &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(RelocationMode::Delete.action(), "deleted");
        assert_eq!(
            RelocationMode::Backup { dir: PathBuf::from("x") }.action(),
            "moved"
        );
    }
}
