use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grouping::{ClusterStrategy, Thresholds};
use crate::ocr::OcrOptions;
use crate::prefilter::BlankFilter;

pub const DEFAULT_BACKUP_DIR: &str = "duplicates_backup";
pub const DEFAULT_REPORT_FILE: &str = "cleanup_report.json";
pub const DEFAULT_RESIZE: u32 = 64;

/// Everything the analysis pass needs, embedded verbatim in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub thresholds: Thresholds,
    pub strategy: ClusterStrategy,
    /// Side of the square grayscale grid used for pixel comparison.
    pub resize: u32,
    pub ocr: OcrOptions,
    pub extensions: Vec<String>,
    /// `None` disables blank pruning.
    pub blank_filter: Option<BlankFilter>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            strategy: ClusterStrategy::default(),
            resize: DEFAULT_RESIZE,
            ocr: OcrOptions::default(),
            extensions: vec!["png".to_string()],
            blank_filter: None,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        let crop = self.ocr.crop_fraction;
        if !(crop > 0.0 && crop <= 1.0) {
            return Err(ConfigError::CropFraction(crop));
        }
        if self.resize == 0 {
            return Err(ConfigError::Resize);
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.text, 0.80);
        assert_eq!(config.thresholds.image, 0.95);
        assert_eq!(config.ocr.crop_fraction, 0.5);
        assert_eq!(config.strategy, ClusterStrategy::RepresentativeGreedy);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = DedupConfig::default();
        config.thresholds.image = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange { name: "image similarity threshold", .. })
        ));

        let mut config = DedupConfig::default();
        config.ocr.crop_fraction = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::CropFraction(_))));

        let mut config = DedupConfig::default();
        config.resize = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Resize)));

        let mut config = DedupConfig::default();
        config.extensions.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoExtensions)));
    }
}
