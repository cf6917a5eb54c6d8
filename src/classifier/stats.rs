//! Document-wide statistics used by heading scorers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::TextBlock;

/// Body size assumed for documents without any text.
const DEFAULT_BODY_SIZE: f32 = 12.0;

/// Font-size distribution and whitespace baseline of one document.
///
/// Computed once per document and passed to every scorer call.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStats {
    /// Modal (character-weighted) font size
    pub body_size: f32,
    /// Largest font size seen
    pub max_size: f32,
    /// Median vertical gap between consecutive blocks on the same page
    pub gap_baseline: f32,
    /// Characters per 0.1pt size bucket
    histogram: BTreeMap<i32, usize>,
    total_chars: usize,
}

impl DocumentStats {
    /// Gather statistics over the ordered blocks of a document.
    pub fn from_blocks(blocks: &[TextBlock]) -> Self {
        let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
        let mut total_chars = 0usize;
        let mut max_size: f32 = 0.0;

        for block in blocks {
            let chars = block.char_count();
            *histogram.entry(size_bucket(block.font_size)).or_insert(0) += chars;
            total_chars += chars;
            max_size = max_size.max(block.font_size);
        }

        // Smallest size wins ties so running text beats equally long headings.
        let body_size = histogram
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .filter(|(_, count)| **count > 0)
            .map(|(bucket, _)| *bucket as f32 / 10.0)
            .unwrap_or(DEFAULT_BODY_SIZE);

        let mut gaps: Vec<f32> = blocks
            .windows(2)
            .filter(|pair| pair[0].page == pair[1].page)
            .map(|pair| pair[1].bbox.y0 - pair[0].bbox.y1)
            .filter(|gap| *gap > 0.0)
            .collect();
        gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let gap_baseline = if gaps.is_empty() {
            body_size * 0.5
        } else {
            gaps[gaps.len() / 2]
        };

        Self {
            body_size,
            max_size: max_size.max(body_size),
            gap_baseline,
            histogram,
            total_chars,
        }
    }

    /// Fraction of the document's characters set in a strictly smaller size.
    pub fn size_percentile(&self, size: f32) -> f32 {
        if self.total_chars == 0 {
            return 0.0;
        }
        let bucket = size_bucket(size);
        let smaller: usize = self.histogram.range(..bucket).map(|(_, count)| count).sum();
        smaller as f32 / self.total_chars as f32
    }

    /// Font size relative to the body size.
    pub fn size_ratio(&self, size: f32) -> f32 {
        size / self.body_size
    }

    /// Number of distinct 0.1pt font sizes carrying text.
    pub fn distinct_sizes(&self) -> usize {
        self.histogram.values().filter(|count| **count > 0).count()
    }
}

fn size_bucket(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Vertical whitespace around a block on its page.
///
/// `None` means there is no neighbouring block on the same page in that
/// direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spacing {
    pub before: Option<f32>,
    pub after: Option<f32>,
}

impl Spacing {
    /// Spacing of the block at `index` within the ordered block list.
    pub fn around(blocks: &[TextBlock], index: usize) -> Self {
        let block = &blocks[index];
        let before = index
            .checked_sub(1)
            .map(|i| &blocks[i])
            .filter(|prev| prev.page == block.page)
            .map(|prev| (block.bbox.y0 - prev.bbox.y1).max(0.0));
        let after = blocks
            .get(index + 1)
            .filter(|next| next.page == block.page)
            .map(|next| (next.bbox.y0 - block.bbox.y1).max(0.0));
        Self { before, after }
    }
}
