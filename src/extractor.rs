//! The extraction pipeline for a single document.

use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheOptions, OutlineCache};
use crate::classifier::{ClassifierOptions, HeadingClassifier, HeadingScorer};
use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::hierarchy::{HierarchyOptions, OutlineBuilder};
use crate::model::{ExtractionResult, PageRuns};
use crate::processor::{ProcessorOptions, TextProcessor};
use crate::source::{LopdfSource, PageSource};

/// Runs source → processor → classifier → builder, with an optional cache
/// in front.
///
/// Shared by reference across batch workers.
pub struct OutlineExtractor {
    source: Arc<dyn PageSource>,
    processor: TextProcessor,
    classifier: HeadingClassifier,
    builder: OutlineBuilder,
    cache: Option<OutlineCache>,
}

impl OutlineExtractor {
    /// Extractor with default options, the lopdf decoder and no cache.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an extractor.
    pub fn builder() -> OutlineExtractorBuilder {
        OutlineExtractorBuilder::default()
    }

    /// Build an extractor from a full configuration.
    ///
    /// The cache is opened when enabled; failing to open it only disables
    /// caching.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let mut builder = Self::builder()
            .processor_options(config.processor.clone())
            .classifier_options(config.classifier.clone())
            .hierarchy_options(config.hierarchy.clone());
        if config.cache.enabled {
            builder = builder.cache_options(config.cache.clone());
        }
        builder.build()
    }

    /// The cache, when enabled.
    pub fn cache(&self) -> Option<&OutlineCache> {
        self.cache.as_ref()
    }

    /// Extract the outline of the document at `path`.
    ///
    /// A cache hit returns without decoding or classifying. Decoder errors
    /// are returned unchanged.
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.lookup(path)) {
            return Ok(cached);
        }

        log::debug!("Decoding {} with {}", path.display(), self.source.name());
        let pages = self.source.load_pages(path)?;
        let result = self.extract_pages(&pages);

        if let Some(cache) = &self.cache {
            cache.store(path, &result);
        }
        Ok(result)
    }

    /// Run the pipeline on already decoded pages, bypassing cache and decoder.
    pub fn extract_pages(&self, pages: &[PageRuns]) -> ExtractionResult {
        let blocks = self.processor.process(pages);
        let candidates = self.classifier.classify(&blocks);
        let result = self.builder.build(&candidates, &blocks);
        log::debug!(
            "Outline has {} headings, title {:?}",
            result.outline.len(),
            result.title
        );
        result
    }
}

impl Default for OutlineExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`OutlineExtractor`].
#[derive(Default)]
pub struct OutlineExtractorBuilder {
    source: Option<Arc<dyn PageSource>>,
    scorer: Option<Arc<dyn HeadingScorer>>,
    processor: ProcessorOptions,
    classifier: ClassifierOptions,
    hierarchy: HierarchyOptions,
    cache: Option<CacheOptions>,
}

impl OutlineExtractorBuilder {
    /// Use a different page source.
    pub fn source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a custom heading scorer.
    pub fn scorer(mut self, scorer: Arc<dyn HeadingScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Set text processor options.
    pub fn processor_options(mut self, options: ProcessorOptions) -> Self {
        self.processor = options;
        self
    }

    /// Set classifier options.
    pub fn classifier_options(mut self, options: ClassifierOptions) -> Self {
        self.classifier = options;
        self
    }

    /// Set hierarchy options.
    pub fn hierarchy_options(mut self, options: HierarchyOptions) -> Self {
        self.hierarchy = options;
        self
    }

    /// Enable the cache with the given options.
    pub fn cache_options(mut self, options: CacheOptions) -> Self {
        self.cache = Some(options);
        self
    }

    /// Build the extractor.
    pub fn build(self) -> OutlineExtractor {
        let classifier = match self.scorer {
            Some(scorer) => HeadingClassifier::with_scorer(self.classifier, scorer),
            None => HeadingClassifier::new(self.classifier),
        };

        let cache = self
            .cache
            .filter(|options| options.enabled)
            .and_then(|options| match OutlineCache::open(&options) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    log::warn!(
                        "Cache disabled, cannot open {}: {}",
                        options.cache_dir.display(),
                        e
                    );
                    None
                }
            });

        OutlineExtractor {
            source: self.source.unwrap_or_else(|| Arc::new(LopdfSource::new())),
            processor: TextProcessor::new(self.processor),
            classifier,
            builder: OutlineBuilder::new(self.hierarchy),
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{OutlineNode, TextRun};
    use std::path::Path;

    struct StaticSource(Vec<PageRuns>);

    impl PageSource for StaticSource {
        fn load_pages(&self, path: &Path) -> Result<Vec<PageRuns>> {
            if path.to_string_lossy().contains("broken") {
                return Err(Error::Decode("bad xref".to_string()));
            }
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn body(text: &str, top: f32) -> TextRun {
        TextRun::at(text, 72.0, top, 12.0, false)
    }

    fn introduction_page() -> Vec<PageRuns> {
        vec![PageRuns::new(
            0,
            vec![
                TextRun::at("Introduction", 72.0, 72.0, 24.0, true),
                body("This opening paragraph describes the purpose", 120.0),
                body("of the document and the problem it addresses", 134.0),
                body("in enough words to look like running text.", 148.0),
            ],
        )]
    }

    #[test]
    fn test_extract_pages_scenario() {
        let result = OutlineExtractor::new().extract_pages(&introduction_page());
        assert_eq!(result.title, "");
        assert_eq!(result.outline, vec![OutlineNode::new(1, "Introduction", 0)]);
    }

    #[test]
    fn test_no_blocks_gives_empty_result() {
        let result = OutlineExtractor::new().extract_pages(&[PageRuns::new(0, vec![])]);
        assert_eq!(result, ExtractionResult::default());
    }

    #[test]
    fn test_source_errors_propagate() {
        let extractor = OutlineExtractor::builder()
            .source(Arc::new(StaticSource(introduction_page())))
            .build();
        let err = extractor.extract("broken.pdf").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(extractor.extract("fine.pdf").is_ok());
    }

    #[test]
    fn test_extractor_is_sync() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<OutlineExtractor>();
    }
}
