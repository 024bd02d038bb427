//! Blank-screenshot pruning ahead of grouping.
//!
//! Captures taken before a page finishes rendering are tiny files, and a few
//! capture steps are known by name to never show task content.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIN_BYTES: u64 = 5000;

pub const NO_CONTENT_PATTERNS: &[&str] = &[
    "switch_to_fullscreen",
    "fullscreen_prompt",
    "blank_screen",
    "loading_screen",
    "empty_page",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankFilter {
    /// Files strictly smaller than this are blank.
    pub min_bytes: u64,
    /// Lowercase substrings of file names that mark a capture as blank.
    pub name_patterns: Vec<String>,
}

impl Default for BlankFilter {
    fn default() -> Self {
        Self {
            min_bytes: DEFAULT_MIN_BYTES,
            name_patterns: NO_CONTENT_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BlankReason {
    TooSmall { bytes: u64 },
    NoContentName { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankFile {
    pub path: PathBuf,
    pub name: String,
    #[serde(flatten)]
    pub reason: BlankReason,
}

impl BlankFilter {
    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub fn classify(&self, path: &Path, size: u64) -> Option<BlankReason> {
        if size < self.min_bytes {
            return Some(BlankReason::TooSmall { bytes: size });
        }
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        self.name_patterns
            .iter()
            .find(|pattern| name.contains(pattern.as_str()))
            .map(|pattern| BlankReason::NoContentName {
                pattern: pattern.clone(),
            })
    }

    /// Split `files` into the ones worth grouping and the blank ones.
    ///
    /// Files whose size cannot be read are kept; grouping reports their
    /// decode failure.
    pub fn partition(&self, files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<BlankFile>) {
        let mut kept = Vec::with_capacity(files.len());
        let mut blanks = Vec::new();

        for path in files {
            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    log::warn!("Could not stat {}: {}", path.display(), e);
                    kept.push(path);
                    continue;
                }
            };
            match self.classify(&path, size) {
                Some(reason) => {
                    log::info!("Blank screenshot {}: {:?}", path.display(), reason);
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    blanks.push(BlankFile { path, name, reason });
                }
                None => kept.push(path),
            }
        }

        (kept, blanks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_by_size_and_name() {
        let filter = BlankFilter::default();
        assert_eq!(
            filter.classify(Path::new("01_trial.png"), 120),
            Some(BlankReason::TooSmall { bytes: 120 })
        );
        assert_eq!(
            filter.classify(Path::new("02_Switch_To_Fullscreen.png"), 90_000),
            Some(BlankReason::NoContentName {
                pattern: "switch_to_fullscreen".to_string()
            })
        );
        assert_eq!(filter.classify(Path::new("03_trial.png"), 90_000), None);
        assert_eq!(filter.classify(Path::new("04.png"), DEFAULT_MIN_BYTES), None);
    }

    #[test]
    fn test_partition_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for (name, size) in [
            ("a.png", 10),
            ("b.png", 6000),
            ("c_loading_screen.png", 6000),
            ("d.png", 7000),
        ] {
            let path = temp_dir.path().join(name);
            fs::write(&path, vec![0u8; size]).unwrap();
            files.push(path);
        }
        files.push(temp_dir.path().join("missing.png"));

        let (kept, blanks) = BlankFilter::default().partition(files);
        let kept: Vec<_> = kept
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(kept, vec!["b.png", "d.png", "missing.png"]);
        assert_eq!(blanks.len(), 2);
        assert_eq!(blanks[0].name, "a.png");
        assert_eq!(blanks[1].name, "c_loading_screen.png");
    }

    #[test]
    fn test_custom_min_bytes() {
        let filter = BlankFilter::default().with_min_bytes(0);
        assert_eq!(filter.classify(Path::new("a.png"), 0), None);
    }
}
