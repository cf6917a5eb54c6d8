//! Outline assembly: title detection, level clamping and duplicate removal.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

use crate::classifier::DocumentStats;
use crate::model::{ExtractionResult, HeadingCandidate, OutlineNode, TextBlock};

/// Options for outline assembly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HierarchyOptions {
    /// Whether to look for a document title on the first page
    pub detect_title: bool,

    /// Minimum title size relative to the body size
    pub title_min_ratio: f32,

    /// Repeated headings closer than this many blocks are collapsed
    pub dedup_window: usize,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            detect_title: true,
            title_min_ratio: 1.2,
            dedup_window: 5,
        }
    }
}

impl HierarchyOptions {
    /// Create new hierarchy options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable title detection.
    pub fn with_title_detection(mut self, detect: bool) -> Self {
        self.detect_title = detect;
        self
    }

    /// Set the minimum title size ratio.
    pub fn with_title_min_ratio(mut self, ratio: f32) -> Self {
        self.title_min_ratio = ratio;
        self
    }

    /// Set the duplicate collapsing window.
    pub fn with_dedup_window(mut self, window: usize) -> Self {
        self.dedup_window = window;
        self
    }
}

/// Builds the final [`ExtractionResult`] from classified headings.
#[derive(Debug, Clone, Default)]
pub struct OutlineBuilder {
    options: HierarchyOptions,
}

impl OutlineBuilder {
    /// Create a builder with the given options.
    pub fn new(options: HierarchyOptions) -> Self {
        Self { options }
    }

    /// Get the builder options.
    pub fn options(&self) -> &HierarchyOptions {
        &self.options
    }

    /// Assemble the outline.
    ///
    /// `candidates` may include body blocks; only headings are used. `blocks`
    /// is the full block list and is only consulted for the title. Never
    /// fails: without headings the outline is empty.
    pub fn build(&self, candidates: &[HeadingCandidate], blocks: &[TextBlock]) -> ExtractionResult {
        let mut headings: Vec<&HeadingCandidate> =
            candidates.iter().filter(|c| c.is_heading()).collect();
        headings.sort_by_key(|c| c.block.block_index);

        let title_block = if self.options.detect_title {
            self.detect_title(&headings, blocks)
        } else {
            None
        };
        let title = title_block.map(|b| b.text.clone()).unwrap_or_default();
        let title_index = title_block.map(|b| b.block_index);
        headings.retain(|c| Some(c.block.block_index) != title_index);

        // The shallowest remaining level becomes level 1.
        let shift = headings
            .iter()
            .filter_map(|c| c.level)
            .min()
            .unwrap_or(1)
            .saturating_sub(1);

        let mut outline: Vec<OutlineNode> = Vec::new();
        let mut stack: Vec<u8> = Vec::new();
        let mut last: Option<(String, u8, usize)> = None;

        for candidate in headings {
            let Some(raw_level) = candidate.level.map(|l| l - shift) else {
                continue;
            };

            let top = stack.last().copied().unwrap_or(0);
            let level = raw_level.clamp(1, top + 1);
            if level != raw_level {
                log::debug!(
                    "Clamped {:?} from level {} to {}",
                    candidate.block.text,
                    raw_level,
                    level
                );
            }

            let key = dedup_key(&candidate.block.text);
            let index = candidate.block.block_index;
            if let Some((last_key, last_level, last_index)) = &last {
                if *last_key == key
                    && *last_level == level
                    && index.saturating_sub(*last_index) <= self.options.dedup_window
                {
                    log::debug!("Collapsed duplicate heading {:?}", candidate.block.text);
                    last = Some((key, level, index));
                    continue;
                }
            }

            while stack.last().is_some_and(|l| *l >= level) {
                stack.pop();
            }
            stack.push(level);

            outline.push(OutlineNode::new(
                level,
                candidate.block.text.clone(),
                candidate.block.page,
            ));
            last = Some((key, level, index));
        }

        ExtractionResult::new(title, outline)
    }

    /// The largest qualifying first-page block, if it comes before every
    /// other heading and at least one heading follows it.
    fn detect_title<'a>(
        &self,
        headings: &[&HeadingCandidate],
        blocks: &'a [TextBlock],
    ) -> Option<&'a TextBlock> {
        let stats = DocumentStats::from_blocks(blocks);
        let scores: HashMap<usize, f32> = headings
            .iter()
            .map(|c| (c.block.block_index, c.score))
            .collect();
        let score_of = |b: &TextBlock| scores.get(&b.block_index).copied().unwrap_or(0.0);

        let title = blocks
            .iter()
            .filter(|b| b.page == 0 && b.has_letters())
            .filter(|b| b.font_size >= self.options.title_min_ratio * stats.body_size)
            .max_by(|a, b| {
                a.font_size
                    .partial_cmp(&b.font_size)
                    .unwrap_or(Ordering::Equal)
                    .then(score_of(a).partial_cmp(&score_of(b)).unwrap_or(Ordering::Equal))
                    .then(b.block_index.cmp(&a.block_index))
            })?;

        let first_other = headings
            .iter()
            .find(|c| c.block.block_index != title.block_index)?;
        if first_other.block.block_index > title.block_index {
            Some(title)
        } else {
            None
        }
    }
}

/// Comparison key for duplicate headings.
fn dedup_key(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
