//! Heading classification.
//!
//! Blocks are scored against document-wide statistics by a pluggable
//! [`HeadingScorer`]. Blocks scoring above the threshold become headings and
//! are ranked into levels by font size, weight and numbering depth.

mod numbering;
mod scorer;
mod stats;

pub use numbering::NumberingPattern;
pub use scorer::{HeadingScorer, ScoreWeights, WeightedScorer};
pub use stats::{DocumentStats, Spacing};

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::model::{HeadingCandidate, TextBlock};

/// Deepest level the classifier may assign.
pub const MAX_LEVELS: u8 = 6;

/// Options for heading classification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Blocks scoring strictly above this are headings
    pub heading_threshold: f32,

    /// Number of heading levels to bin into (1..=6)
    pub max_levels: u8,

    /// Weights of the default scorer
    pub weights: ScoreWeights,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            heading_threshold: 0.5,
            max_levels: 3,
            weights: ScoreWeights::default(),
        }
    }
}

impl ClassifierOptions {
    /// Create new classifier options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.heading_threshold = threshold;
        self
    }

    /// Set the number of levels, clamped to 1..=6.
    pub fn with_max_levels(mut self, levels: u8) -> Self {
        self.max_levels = levels.clamp(1, MAX_LEVELS);
        self
    }

    /// Set the scorer weights.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }
}

/// Turns text blocks into heading candidates.
#[derive(Clone)]
pub struct HeadingClassifier {
    options: ClassifierOptions,
    scorer: Arc<dyn HeadingScorer>,
    numbering: NumberingPattern,
}

impl HeadingClassifier {
    /// Create a classifier using the [`WeightedScorer`].
    pub fn new(options: ClassifierOptions) -> Self {
        let scorer = Arc::new(WeightedScorer::new(options.weights.clone()));
        Self::with_scorer(options, scorer)
    }

    /// Create a classifier with a custom scorer.
    pub fn with_scorer(options: ClassifierOptions, scorer: Arc<dyn HeadingScorer>) -> Self {
        Self {
            options,
            scorer,
            numbering: NumberingPattern::new(),
        }
    }

    /// Get the classifier options.
    pub fn options(&self) -> &ClassifierOptions {
        &self.options
    }

    /// Classify every block; the output has the same length and order.
    pub fn classify(&self, blocks: &[TextBlock]) -> Vec<HeadingCandidate> {
        let stats = DocumentStats::from_blocks(blocks);

        let mut candidates: Vec<HeadingCandidate> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let score = if block.has_letters() {
                    self.scorer.score(block, Spacing::around(blocks, i), &stats)
                } else {
                    0.0
                };
                HeadingCandidate {
                    block: block.clone(),
                    level: None,
                    score,
                }
            })
            .collect();

        let headings: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.score > self.options.heading_threshold)
            .map(|(i, _)| i)
            .collect();

        let levels = self.assign_levels(headings.iter().map(|&i| &candidates[i].block));
        for (&i, level) in headings.iter().zip(levels) {
            candidates[i].level = Some(level);
        }

        log::debug!(
            "Classified {} of {} blocks as headings (body size {:.1}pt)",
            headings.len(),
            blocks.len(),
            stats.body_size
        );
        candidates
    }

    /// Rank the distinct style keys of the headings and bin them into levels.
    fn assign_levels<'a>(&self, headings: impl Iterator<Item = &'a TextBlock>) -> Vec<u8> {
        let keys: Vec<LevelKey> = headings.map(|b| self.level_key(b)).collect();

        let mut distinct: Vec<(LevelKey, usize)> = Vec::new();
        for (position, key) in keys.iter().enumerate() {
            if !distinct.iter().any(|(k, _)| k == key) {
                distinct.push((*key, position));
            }
        }
        distinct.sort_by_key(|(key, first)| (key.ordering(), *first));

        let bins = self.options.max_levels.clamp(1, MAX_LEVELS) as usize;
        let count = distinct.len();
        let rank: HashMap<LevelKey, u8> = distinct
            .iter()
            .enumerate()
            .map(|(i, (key, _))| {
                let level = if count <= bins { i + 1 } else { 1 + i * bins / count };
                (*key, level as u8)
            })
            .collect();

        keys.iter().map(|key| rank[key]).collect()
    }

    fn level_key(&self, block: &TextBlock) -> LevelKey {
        LevelKey {
            half_points: (block.font_size * 2.0).round() as i32,
            bold: block.is_bold,
            depth: self.numbering.depth(&block.text).unwrap_or(1).max(1),
        }
    }
}

impl Default for HeadingClassifier {
    fn default() -> Self {
        Self::new(ClassifierOptions::default())
    }
}

/// Style of a heading for level ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LevelKey {
    half_points: i32,
    bold: bool,
    depth: usize,
}

impl LevelKey {
    /// Larger fonts first, then bold, then shallower numbering.
    fn ordering(&self) -> (Reverse<i32>, Reverse<bool>, usize) {
        (Reverse(self.half_points), Reverse(self.bold), self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn block(text: &str, size: f32, bold: bool, index: usize) -> TextBlock {
        let y0 = 60.0 + index as f32 * 40.0;
        TextBlock {
            text: text.to_string(),
            page: 0,
            font_size: size,
            is_bold: bold,
            bbox: BBox::new(72.0, y0, 400.0, y0 + size),
            block_index: index,
        }
    }

    fn body(index: usize) -> TextBlock {
        block(
            "Ordinary running text that fills the page with many words of content here.",
            11.0,
            false,
            index,
        )
    }

    #[test]
    fn test_output_matches_input_length() {
        let blocks = vec![block("Introduction", 20.0, true, 0), body(1), body(2)];
        let candidates = HeadingClassifier::default().classify(&blocks);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].level, Some(1));
        assert!(candidates[1..].iter().all(|c| !c.is_heading()));
    }

    #[test]
    fn test_levels_follow_font_size() {
        let blocks = vec![
            block("Overview", 20.0, true, 0),
            body(1),
            block("Scope", 16.0, true, 2),
            body(3),
            block("Details", 14.0, true, 4),
            body(5),
            block("Summary", 20.0, true, 6),
            body(7),
        ];
        let candidates = HeadingClassifier::default().classify(&blocks);
        let levels: Vec<Option<u8>> = candidates.iter().map(|c| c.level).collect();
        assert_eq!(
            levels,
            vec![Some(1), None, Some(2), None, Some(3), None, Some(1), None]
        );
    }

    #[test]
    fn test_numbering_depth_breaks_size_ties() {
        let blocks = vec![
            block("1 Methods", 14.0, true, 0),
            body(1),
            block("1.1 Sampling", 14.0, true, 2),
            body(3),
        ];
        let candidates = HeadingClassifier::default().classify(&blocks);
        assert_eq!(candidates[0].level, Some(1));
        assert_eq!(candidates[2].level, Some(2));
    }

    #[test]
    fn test_levels_binned_into_max_levels() {
        let sizes = [30.0, 26.0, 22.0, 18.0, 16.0];
        let mut blocks = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let text = format!("Heading {}", (b'A' + i as u8) as char);
            blocks.push(block(&text, *size, true, i * 2));
            blocks.push(body(i * 2 + 1));
        }
        let classifier = HeadingClassifier::new(ClassifierOptions::new().with_max_levels(3));
        let levels: Vec<u8> = classifier
            .classify(&blocks)
            .iter()
            .filter_map(|c| c.level)
            .collect();
        assert_eq!(levels, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn test_text_without_letters_never_heading() {
        let blocks = vec![block("2024", 30.0, true, 0), body(1)];
        let candidates = HeadingClassifier::default().classify(&blocks);
        assert!(!candidates[0].is_heading());
        assert_eq!(candidates[0].score, 0.0);
    }

    struct FixedScorer {
        calls: AtomicUsize,
    }

    impl HeadingScorer for FixedScorer {
        fn score(&self, block: &TextBlock, _: Spacing, _: &DocumentStats) -> f32 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if block.is_bold {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_custom_scorer() {
        let scorer = Arc::new(FixedScorer {
            calls: AtomicUsize::new(0),
        });
        let classifier =
            HeadingClassifier::with_scorer(ClassifierOptions::default(), scorer.clone());
        let blocks = vec![block("bold body", 11.0, true, 0), body(1), block("---", 11.0, true, 2)];
        let candidates = classifier.classify(&blocks);
        assert!(candidates[0].is_heading());
        assert!(!candidates[1].is_heading());
        // blocks without letters are not scored at all
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 2);
    }
}
