use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cleanup::Analysis;
use crate::config::DedupConfig;
use crate::error::ReportError;
use crate::grouping::{ClusterStrategy, DuplicateGroup, ImageRecord, Thresholds};
use crate::prefilter::BlankFile;
use crate::relocate::{Relocation, RelocationMode};

/// JSON summary of one cleanup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub timestamp: String,
    pub directory: PathBuf,
    pub total_files: usize,
    pub unique_groups: usize,
    pub duplicate_count: usize,
    pub blank_count: usize,
    pub reduction_percentage: f64,
    pub thresholds: Thresholds,
    pub strategy: ClusterStrategy,
    /// `false` for a dry run.
    pub executed: bool,
    /// `dry-run`, `moved` or `deleted`.
    pub action: String,
    pub backup_dir: Option<PathBuf>,
    pub config: DedupConfig,
    pub groups: Vec<GroupReport>,
    pub blank_files: Vec<BlankFile>,
    pub failures: Vec<Relocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
    pub text_hash: String,
    pub file_size: u64,
    pub content_hash: Option<String>,
}

impl From<&ImageRecord> for RecordSummary {
    fn from(record: &ImageRecord) -> Self {
        Self {
            name: record.name.clone(),
            path: record.path.clone(),
            text: record.extracted_text.clone(),
            text_hash: record.text_hash.clone(),
            file_size: record.file_size,
            content_hash: record.content_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateSummary {
    #[serde(flatten)]
    pub record: RecordSummary,
    pub duplicate_of: String,
    pub text_similarity: f64,
    pub image_similarity: f64,
    /// Byte-identical to the group representative.
    pub exact_copy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub representative: RecordSummary,
    pub duplicates: Vec<DuplicateSummary>,
}

impl From<&DuplicateGroup> for GroupReport {
    fn from(group: &DuplicateGroup) -> Self {
        let rep_hash = group.representative.content_hash.as_deref();
        Self {
            representative: RecordSummary::from(&group.representative),
            duplicates: group
                .members
                .iter()
                .map(|member| DuplicateSummary {
                    record: RecordSummary::from(&member.record),
                    duplicate_of: member.matched_with.clone(),
                    text_similarity: member.scores.text,
                    image_similarity: member.scores.image,
                    exact_copy: rep_hash.is_some()
                        && member.record.content_hash.as_deref() == rep_hash,
                })
                .collect(),
        }
    }
}

impl CleanupReport {
    /// Build a report; `applied` is `None` for a dry run.
    pub fn new(analysis: &Analysis, applied: Option<(&RelocationMode, &[Relocation])>) -> Self {
        let (executed, action, backup_dir, failures) = match applied {
            Some((mode, outcomes)) => (
                true,
                mode.action().to_string(),
                match mode {
                    RelocationMode::Backup { dir } => Some(dir.clone()),
                    RelocationMode::Delete => None,
                },
                outcomes.iter().filter(|o| !o.succeeded()).cloned().collect(),
            ),
            None => (false, "dry-run".to_string(), None, Vec::new()),
        };

        let grouping = &analysis.grouping;
        Self {
            timestamp: Utc::now().to_rfc3339(),
            directory: analysis.directory.clone(),
            total_files: analysis.total_files,
            unique_groups: grouping.unique_count(),
            duplicate_count: grouping.duplicate_count(),
            blank_count: analysis.blanks.len(),
            reduction_percentage: analysis.reduction_percentage(),
            thresholds: grouping.thresholds,
            strategy: grouping.strategy,
            executed,
            action,
            backup_dir,
            config: analysis.config.clone(),
            groups: grouping.groups.iter().map(GroupReport::from).collect(),
            blank_files: analysis.blanks.clone(),
            failures,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}
