//! Text processing: raw runs to normalized, denoised blocks.
//!
//! Per page, runs are sorted into reading order, grouped into lines and
//! merged into blocks. Blocks are then normalized and filtered: bare page
//! numbers and running headers or footers that repeat across pages are
//! dropped. Surviving blocks receive a document-wide `block_index`.

mod lines;
mod noise;

pub(crate) use lines::is_spaceless_script_char;

use serde::Deserialize;

use crate::model::{PageRuns, TextBlock};
use lines::{group_lines_into_blocks, group_runs_into_lines, RawBlock};
use noise::{remove_running_furniture, TextCleaner};

/// Options for block assembly and noise filtering.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Horizontal gap (in multiples of font size) that splits a line
    pub max_word_gap: f32,

    /// Largest vertical gap between lines of one block, relative to font size
    pub line_gap_ratio: f32,

    /// Font sizes closer than this (points) count as the same font
    pub size_tolerance: f32,

    /// Largest left-edge (or center) offset between lines of one block
    pub indent_tolerance: f32,

    /// Pages a text must repeat on to count as a running header/footer
    /// (0 disables the filter)
    pub repeat_min_pages: usize,

    /// Vertical tolerance (points) when matching repeated text
    pub repeat_y_tolerance: f32,

    /// Whether to drop blocks that are bare page numbers
    pub strip_page_numbers: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_word_gap: 3.0,
            line_gap_ratio: 0.8,
            size_tolerance: 0.5,
            indent_tolerance: 20.0,
            repeat_min_pages: 3,
            repeat_y_tolerance: 3.0,
            strip_page_numbers: true,
        }
    }
}

impl ProcessorOptions {
    /// Create new processor options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line-splitting gap.
    pub fn with_max_word_gap(mut self, gap: f32) -> Self {
        self.max_word_gap = gap;
        self
    }

    /// Set the line gap ratio.
    pub fn with_line_gap_ratio(mut self, ratio: f32) -> Self {
        self.line_gap_ratio = ratio;
        self
    }

    /// Set the indent tolerance.
    pub fn with_indent_tolerance(mut self, tolerance: f32) -> Self {
        self.indent_tolerance = tolerance;
        self
    }

    /// Set how many pages a running header/footer must appear on.
    pub fn with_repeat_min_pages(mut self, pages: usize) -> Self {
        self.repeat_min_pages = pages;
        self
    }

    /// Enable or disable page number removal.
    pub fn with_strip_page_numbers(mut self, strip: bool) -> Self {
        self.strip_page_numbers = strip;
        self
    }
}

/// Converts page runs into ordered text blocks.
pub struct TextProcessor {
    options: ProcessorOptions,
    cleaner: TextCleaner,
}

impl TextProcessor {
    /// Create a processor with the given options.
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            options,
            cleaner: TextCleaner::new(),
        }
    }

    /// Get the processor options.
    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Produce blocks for the whole document.
    ///
    /// Never fails: unusable runs are dropped and a document without text
    /// yields an empty list. Blocks come back sorted by page, then top to
    /// bottom within a page, with `block_index` equal to their position.
    pub fn process(&self, pages: &[PageRuns]) -> Vec<TextBlock> {
        let mut ordered: Vec<&PageRuns> = pages.iter().collect();
        ordered.sort_by_key(|p| p.page);

        let mut blocks = Vec::new();
        for page in ordered {
            let lines = group_runs_into_lines(page.runs.clone(), &self.options);
            let raws: Vec<(String, RawBlock)> = group_lines_into_blocks(lines, &self.options)
                .into_iter()
                .map(|raw| (self.cleaner.normalize(&raw.text), raw))
                .filter(|(text, _)| !text.is_empty())
                .collect();

            for (text, raw) in &raws {
                if self.options.strip_page_numbers
                    && self.cleaner.is_page_number(text)
                    && self.is_page_edge(raw, &raws)
                {
                    continue;
                }
                blocks.push(TextBlock {
                    text: text.clone(),
                    page: page.page,
                    font_size: raw.font_size,
                    is_bold: raw.is_bold,
                    bbox: raw.bbox,
                    block_index: 0,
                });
            }
        }

        let mut blocks = remove_running_furniture(blocks, &self.options);
        for (i, block) in blocks.iter_mut().enumerate() {
            block.block_index = i;
        }

        log::debug!("Assembled {} blocks from {} pages", blocks.len(), pages.len());
        blocks
    }
}

impl TextProcessor {
    /// Whether nothing on the page lies above `block`, or nothing below it.
    fn is_page_edge(&self, block: &RawBlock, page: &[(String, RawBlock)]) -> bool {
        let tolerance = self.options.repeat_y_tolerance;
        let topmost = page
            .iter()
            .all(|(_, other)| other.bbox.y0 >= block.bbox.y0 - tolerance);
        let bottommost = page
            .iter()
            .all(|(_, other)| other.bbox.y1 <= block.bbox.y1 + tolerance);
        topmost || bottommost
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}
