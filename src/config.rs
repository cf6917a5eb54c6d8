//! Extractor configuration.
//!
//! Every field is optional in the JSON file; missing sections and keys take
//! their defaults.
//!
//! ```json
//! {
//!   "classifier": { "heading_threshold": 0.45, "max_levels": 4 },
//!   "cache": { "cache_dir": "cache", "retention_days": 7 },
//!   "batch": { "max_workers": 4, "retry": { "max_attempts": 2 } }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::batch::BatchOptions;
use crate::cache::CacheOptions;
use crate::classifier::{ClassifierOptions, MAX_LEVELS};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyOptions;
use crate::processor::ProcessorOptions;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const MAX_BACKOFF_BASE: f64 = 10.0;
const MAX_INITIAL_DELAY_SECS: f64 = 3600.0;

/// Options for every stage of the extractor and the batch driver.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub processor: ProcessorOptions,
    pub classifier: ClassifierOptions,
    pub hierarchy: HierarchyOptions,
    pub cache: CacheOptions,
    pub batch: BatchOptions,
}

impl ExtractorConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate a JSON configuration string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration the way the command line does: an explicit
    /// file if it exists, else `config.json` in `base_dir`, else defaults.
    /// A file that fails to load falls back to defaults with a warning.
    pub fn load_or_default(explicit: Option<&Path>, base_dir: &Path) -> Self {
        let candidate = explicit
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .or_else(|| Some(base_dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()));

        match candidate {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    log::info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to load config: {}. Using defaults.", e);
                    Self::default()
                }
            },
            None => {
                log::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.processor;
        for (name, value) in [
            ("processor.max_word_gap", p.max_word_gap),
            ("processor.line_gap_ratio", p.line_gap_ratio),
            ("processor.size_tolerance", p.size_tolerance),
            ("processor.indent_tolerance", p.indent_tolerance),
            ("processor.repeat_y_tolerance", p.repeat_y_tolerance),
            ("hierarchy.title_min_ratio", self.hierarchy.title_min_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(name, "must be a non-negative number"));
            }
        }

        let c = &self.classifier;
        if !c.heading_threshold.is_finite() {
            return Err(invalid("classifier.heading_threshold", "must be a number"));
        }
        if c.max_levels == 0 || c.max_levels > MAX_LEVELS {
            return Err(invalid("classifier.max_levels", "must be between 1 and 6"));
        }

        let b = &self.batch;
        if b.max_workers == 0 {
            return Err(invalid("batch.max_workers", "must be at least 1"));
        }
        if b.batch_size_multiplier == 0 {
            return Err(invalid("batch.batch_size_multiplier", "must be at least 1"));
        }
        if b.retry.max_attempts == 0 {
            return Err(invalid("batch.retry.max_attempts", "must be at least 1"));
        }
        if !(1.0..=MAX_BACKOFF_BASE).contains(&b.retry.backoff_base) {
            return Err(invalid("batch.retry.backoff_base", "must be between 1.0 and 10.0"));
        }
        if !(0.0..=MAX_INITIAL_DELAY_SECS).contains(&b.retry.initial_delay_secs) {
            return Err(invalid(
                "batch.retry.initial_delay_secs",
                "must be between 0 and 3600 seconds",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::Config(format!("{} {}", field, reason))
}
