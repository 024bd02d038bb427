//! Near-duplicate screenshot culling.
//!
//! Screenshots captured by end-to-end test runs are grouped by the OCR text
//! of their top region together with the pixel correlation of a downsampled
//! grayscale copy. One representative per group is kept; the rest can be
//! moved to a backup directory or deleted, and a JSON report describes the
//! run.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod grouping;
pub mod hash;
pub mod ocr;
pub mod prefilter;
pub mod relocate;
pub mod report;
pub mod scanner;
pub mod similarity;

pub use cleanup::{Analysis, Analyzer, apply};
pub use config::DedupConfig;
pub use error::{CullError, Result};
pub use grouping::{
    ClusterStrategy, DuplicateGroup, GroupMember, Grouping, ImageRecord, MatchScores, Thresholds,
    group_records,
};
pub use ocr::{TesseractExtractor, TextExtractor};
pub use relocate::{Relocation, RelocationMode};
pub use report::CleanupReport;
pub use similarity::{DownsampledCorrelation, VisualComparator, text_similarity};
