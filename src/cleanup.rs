//! The analysis pass and the relocation pass that follows it.
//!
//! Analysis never touches the filesystem beyond reading. Relocation only
//! runs once the grouping is final, so an interrupted analysis leaves the
//! directory as it was.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DedupConfig;
use crate::error::Result;
use crate::grouping::{Grouping, ImageRecord, group_records};
use crate::hash::content_hash;
use crate::ocr::TextExtractor;
use crate::prefilter::BlankFile;
use crate::relocate::{Relocation, RelocationMode, relocate};
use crate::scanner::scan_directory;
use crate::similarity::VisualComparator;

/// Everything learned about a directory, before anything is moved.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub directory: PathBuf,
    pub config: DedupConfig,
    /// Image files found, blanks included.
    pub total_files: usize,
    pub blanks: Vec<BlankFile>,
    pub grouping: Grouping,
}

impl Analysis {
    /// Duplicates followed by blanks: every file a cleanup would relocate.
    pub fn files_to_relocate(&self) -> Vec<PathBuf> {
        self.grouping
            .duplicates()
            .map(|member| member.record.path.clone())
            .chain(self.blanks.iter().map(|blank| blank.path.clone()))
            .collect()
    }

    pub fn reduction_percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let removed = self.grouping.duplicate_count() + self.blanks.len();
        removed as f64 / self.total_files as f64 * 100.0
    }

    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }
}

pub struct Analyzer<'a> {
    config: DedupConfig,
    extractor: &'a dyn TextExtractor,
    comparator: &'a dyn VisualComparator,
    show_progress: bool,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        config: DedupConfig,
        extractor: &'a dyn TextExtractor,
        comparator: &'a dyn VisualComparator,
    ) -> Self {
        Self {
            config,
            extractor,
            comparator,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn analyze(&self, dir: &Path) -> Result<Analysis> {
        self.config.validate()?;

        let files = scan_directory(dir, &self.config.extensions)?;
        let total_files = files.len();

        let (files, blanks) = match &self.config.blank_filter {
            Some(filter) => filter.partition(files),
            None => (files, Vec::new()),
        };

        let records = self.extract_records(files)?;
        let grouping = self.group(records)?;

        Ok(Analysis {
            directory: dir.to_path_buf(),
            config: self.config.clone(),
            total_files,
            blanks,
            grouping,
        })
    }

    fn extract_records(&self, files: Vec<PathBuf>) -> Result<Vec<ImageRecord>> {
        let bar = if self.show_progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );

        let mut records = Vec::with_capacity(files.len());
        for path in files {
            bar.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            records.push(self.extract_record(path));
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(records)
    }

    /// Per-file failures degrade the record instead of aborting the batch.
    fn extract_record(&self, path: PathBuf) -> ImageRecord {
        let text = match self.extractor.extract(&path) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Error extracting text from {}: {}", path.display(), e);
                String::new()
            }
        };
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("Could not stat {}: {}", path.display(), e);
                0
            }
        };
        let hash = content_hash(&path);

        let mut record = ImageRecord::new(path, text).with_file_size(size);
        match hash {
            Ok(hash) => record = record.with_content_hash(hash),
            Err(e) => log::warn!("Could not hash {}: {}", record.path.display(), e),
        }
        log::debug!("{}: {:?}", record.name, record.extracted_text);
        record
    }

    fn group(&self, records: Vec<ImageRecord>) -> Result<Grouping> {
        let spinner = if self.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        spinner.set_message(format!("Comparing {} screenshots…", records.len()));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let grouping = group_records(
            records,
            self.config.thresholds,
            self.config.strategy,
            self.comparator,
        );
        spinner.finish_and_clear();
        Ok(grouping)
    }
}

/// Move or delete every duplicate and blank file of `analysis`.
pub fn apply(analysis: &Analysis, mode: &RelocationMode) -> Result<Vec<Relocation>> {
    let files = analysis.files_to_relocate();
    log::info!("Relocating {} file(s): {}", files.len(), mode.action());
    Ok(relocate(&files, mode)?)
}
