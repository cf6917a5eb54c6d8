//! Normalized text blocks and their classification.

use super::BBox;
use serde::{Deserialize, Serialize};

/// A normalized, denoised logical unit of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Block text, whitespace-collapsed
    pub text: String,
    /// Page number (0-indexed)
    pub page: u32,
    /// Dominant font size in points
    pub font_size: f32,
    /// Whether most of the block's characters are bold
    pub is_bold: bool,
    /// Bounding box (top-left origin)
    pub bbox: BBox,
    /// Document-wide position; the ordering key downstream
    pub block_index: usize,
}

impl TextBlock {
    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Number of characters, used to weight font statistics.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// Check whether the text contains at least one letter.
    pub fn has_letters(&self) -> bool {
        self.text.chars().any(char::is_alphabetic)
    }
}

/// A text block together with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingCandidate {
    /// The classified block
    pub block: TextBlock,
    /// Heading level (1 = most prominent) or `None` for body text
    pub level: Option<u8>,
    /// Composite heading score
    pub score: f32,
}

impl HeadingCandidate {
    /// Check whether the block was classified as a heading.
    pub fn is_heading(&self) -> bool {
        self.level.is_some()
    }
}
