//! Heading scoring.

use serde::Deserialize;

use super::numbering::NumberingPattern;
use super::stats::{DocumentStats, Spacing};
use crate::model::TextBlock;

/// Scores how heading-like a block is.
///
/// Implementations must be pure: the score may depend only on the block,
/// its spacing and the document statistics.
pub trait HeadingScorer: Send + Sync {
    /// Composite heading score; higher means more heading-like.
    fn score(&self, block: &TextBlock, spacing: Spacing, stats: &DocumentStats) -> f32;
}

/// Weights of the default scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the size ratio, reached at 1.5x body size
    pub size: f32,
    /// Weight of the size percentile
    pub percentile: f32,
    /// Bonus for bold text
    pub bold: f32,
    /// Bonus for at most `short_max_words` words
    pub short: f32,
    /// Penalty for more than `long_min_words` words or 200 characters
    pub long_penalty: f32,
    /// Bonus for a numbering/section prefix
    pub numbering: f32,
    /// Bonus per side with whitespace above the baseline
    pub isolation: f32,
    /// Bonus for all-caps text
    pub all_caps: f32,
    /// Bonus for title-case text
    pub title_case: f32,
    /// Penalty for text smaller than body size
    pub small_penalty: f32,
    pub short_max_words: usize,
    pub long_min_words: usize,
    /// Whitespace counts as isolation above this multiple of the baseline
    pub isolation_ratio: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            size: 0.45,
            percentile: 0.1,
            bold: 0.2,
            short: 0.1,
            long_penalty: 0.4,
            numbering: 0.2,
            isolation: 0.075,
            all_caps: 0.1,
            title_case: 0.05,
            small_penalty: 0.3,
            short_max_words: 12,
            long_min_words: 25,
            isolation_ratio: 1.5,
        }
    }
}

/// The default additive scorer.
#[derive(Debug, Clone, Default)]
pub struct WeightedScorer {
    weights: ScoreWeights,
    numbering: NumberingPattern,
}

impl WeightedScorer {
    /// Create a scorer with the given weights.
    pub fn new(weights: ScoreWeights) -> Self {
        Self {
            weights,
            numbering: NumberingPattern::new(),
        }
    }

    /// Get the weights.
    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    fn isolated(&self, gap: Option<f32>, stats: &DocumentStats) -> bool {
        match gap {
            Some(gap) => gap >= self.weights.isolation_ratio * stats.gap_baseline,
            None => true,
        }
    }
}

impl HeadingScorer for WeightedScorer {
    fn score(&self, block: &TextBlock, spacing: Spacing, stats: &DocumentStats) -> f32 {
        if !block.has_letters() {
            return 0.0;
        }
        let w = &self.weights;

        let ratio = stats.size_ratio(block.font_size);
        let mut score = w.size * ((ratio - 1.0) / 0.5).clamp(0.0, 1.0);
        score += w.percentile * stats.size_percentile(block.font_size);
        if block.font_size < stats.body_size - 0.5 {
            score -= w.small_penalty;
        }

        if block.is_bold {
            score += w.bold;
        }

        let words = block.word_count();
        if words <= w.short_max_words {
            score += w.short;
        }
        if words > w.long_min_words || block.text.chars().count() > 200 {
            score -= w.long_penalty;
        }

        if self.numbering.depth(&block.text).is_some() {
            score += w.numbering;
        }

        if self.isolated(spacing.before, stats) {
            score += w.isolation;
        }
        if self.isolated(spacing.after, stats) {
            score += w.isolation;
        }

        match letter_case(&block.text) {
            LetterCase::AllCaps => score += w.all_caps,
            LetterCase::Title => score += w.title_case,
            LetterCase::Other => {}
        }

        score.max(0.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LetterCase {
    AllCaps,
    Title,
    Other,
}

fn letter_case(text: &str) -> LetterCase {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let cased = letters.iter().filter(|c| c.is_uppercase() || c.is_lowercase()).count();
    if cased >= 2 && letters.iter().all(|c| !c.is_lowercase()) {
        return LetterCase::AllCaps;
    }

    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .collect();
    let title = !words.is_empty()
        && words.iter().all(|word| {
            let first = word.chars().find(|c| c.is_alphabetic());
            first.is_some_and(|c| c.is_uppercase()) || is_minor_word(word)
        });
    if title && words.first().is_some_and(|w| !is_minor_word(w)) {
        LetterCase::Title
    } else {
        LetterCase::Other
    }
}

/// Short words that stay lowercase in title case.
fn is_minor_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "and" | "as" | "at" | "by" | "for" | "in" | "of" | "on" | "or" | "the" | "to"
            | "with"
    )
}
