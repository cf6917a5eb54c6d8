//! Positioned text runs as emitted by the content decoder.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in points.
///
/// The origin is the top-left corner of the page and `y` grows downward, so
/// `y0 < y1` and sorting by `y0` yields top-to-bottom order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box width.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Box height.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether all coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

/// A contiguous span of characters sharing font attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,
    /// Effective font size in points
    pub font_size: f32,
    /// Whether the font appears to be bold
    pub is_bold: bool,
    /// Position on the page
    pub bbox: BBox,
}

impl TextRun {
    /// Create a new text run.
    pub fn new(text: impl Into<String>, font_size: f32, is_bold: bool, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold,
            bbox,
        }
    }

    /// Create a run whose box is estimated from its baseline origin.
    ///
    /// `top` is the distance of the glyph tops from the top of the page. The
    /// width assumes an average advance of half the font size per character.
    pub fn at(text: impl Into<String>, x: f32, top: f32, font_size: f32, is_bold: bool) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * 0.5;
        let bbox = BBox::new(x, top, x + width, top + font_size);
        Self::new(text, font_size, is_bold, bbox)
    }

    /// A run the text processor can use: visible text, sane size and box.
    pub fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
            && self.font_size.is_finite()
            && self.font_size > 0.0
            && self.bbox.is_finite()
    }
}

/// All runs of one page, in the order the decoder emitted them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRuns {
    /// Page number (0-indexed)
    pub page: u32,
    /// Runs on the page
    pub runs: Vec<TextRun>,
}

impl PageRuns {
    /// Create a page with the given runs.
    pub fn new(page: u32, runs: Vec<TextRun>) -> Self {
        Self { page, runs }
    }

    /// Check whether the page carries no runs at all.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
