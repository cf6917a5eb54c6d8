//! # pdf-outline
//!
//! Heuristic title and heading outline extraction from PDF documents.
//!
//! The outline is derived from the page text itself (font sizes, weight,
//! numbering, whitespace), not from PDF bookmarks, so it works on documents
//! that carry no navigation structure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_outline::extract_outline;
//!
//! fn main() -> pdf_outline::Result<()> {
//!     let result = extract_outline("document.pdf")?;
//!     println!("{}", result.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - [`source`]: decodes pages into positioned text runs
//! - [`processor`]: merges runs into normalized blocks, drops page furniture
//! - [`classifier`]: scores blocks and assigns heading levels
//! - [`hierarchy`]: detects the title and assembles a gap-free outline
//! - [`cache`]: fingerprint-keyed result cache
//! - [`batch`]: bounded worker pool with retries over many files

pub mod batch;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod detect;
pub mod error;
pub mod extractor;
pub mod hierarchy;
pub mod model;
pub mod processor;
pub mod source;

// Re-export commonly used types
pub use batch::{
    discover_inputs, AttemptState, BatchItem, BatchOptions, BatchProcessor, BatchSummary,
    RetryPolicy,
};
pub use cache::{CacheEntry, CacheOptions, CacheStats, OutlineCache};
pub use classifier::{
    ClassifierOptions, DocumentStats, HeadingClassifier, HeadingScorer, ScoreWeights, Spacing,
    WeightedScorer,
};
pub use config::ExtractorConfig;
pub use detect::{is_pdf, PdfHeader};
pub use error::{Error, Result};
pub use extractor::{OutlineExtractor, OutlineExtractorBuilder};
pub use hierarchy::{HierarchyOptions, OutlineBuilder};
pub use model::{
    BBox, ExtractionResult, HeadingCandidate, OutlineNode, PageRuns, TextBlock, TextRun,
};
pub use processor::{ProcessorOptions, TextProcessor};
pub use source::{LopdfSource, PageSource};

use std::path::Path;

/// Extract the outline of a PDF file with default options and no cache.
///
/// # Example
///
/// ```no_run
/// use pdf_outline::extract_outline;
///
/// let result = extract_outline("document.pdf").unwrap();
/// for node in &result.outline {
///     let indent = node.level as usize * 2;
///     println!("{:indent$}{} (p. {})", "", node.text, node.page, indent = indent);
/// }
/// ```
pub fn extract_outline<P: AsRef<Path>>(path: P) -> Result<ExtractionResult> {
    OutlineExtractor::new().extract(path)
}

/// Extract the outline of a PDF file using a configuration.
///
/// # Example
///
/// ```no_run
/// use pdf_outline::{extract_outline_with_config, ExtractorConfig};
///
/// let config = ExtractorConfig::from_file("config.json").unwrap();
/// let result = extract_outline_with_config("document.pdf", &config).unwrap();
/// println!("{}", result.title);
/// ```
pub fn extract_outline_with_config<P: AsRef<Path>>(
    path: P,
    config: &ExtractorConfig,
) -> Result<ExtractionResult> {
    OutlineExtractor::from_config(config).extract(path)
}

/// Extract the outline of a PDF file and serialize it as pretty JSON.
pub fn to_json<P: AsRef<Path>>(path: P) -> Result<String> {
    extract_outline(path)?.to_json_pretty()
}
