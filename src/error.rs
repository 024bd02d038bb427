use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Directory {} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("Invalid directory: {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Tesseract OCR not found at `{binary}`: {source}")]
    EngineMissing {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tesseract exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Failed to create backup directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no file name", path.display())]
    NoFileName { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("crop fraction must be within (0, 1], got {0}")]
    CropFraction(f64),

    #[error("resize must be at least 1 pixel")]
    Resize,

    #[error("at least one image extension is required")]
    NoExtensions,
}

/// Top-level error for the cleanup pipeline.
#[derive(Debug, Error)]
pub enum CullError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Relocate(#[from] RelocateError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Progress bar template error: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

pub type Result<T, E = CullError> = std::result::Result<T, E>;
