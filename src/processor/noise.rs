//! Text normalization and removal of page furniture.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::ProcessorOptions;
use crate::model::TextBlock;

/// Normalizes block text and recognizes page numbers.
pub(crate) struct TextCleaner {
    page_number: Regex,
    page_of: Regex,
    roman_page: Regex,
    ligature_map: Vec<(&'static str, &'static str)>,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            page_number: Regex::new(r"^[-–—]?\s*\d+\s*[-–—]?$").unwrap(),
            page_of: Regex::new(r"(?i)^(page|p\.|pg\.?)\s*\d+(\s*(of|/)\s*\d+)?$").unwrap(),
            roman_page: Regex::new(r"^c{0,3}(xc|xl|l?x{0,3})(ix|iv|v?i{0,3})$").unwrap(),
            ligature_map: vec![
                ("\u{FB00}", "ff"),  // ﬀ
                ("\u{FB01}", "fi"),  // ﬁ
                ("\u{FB02}", "fl"),  // ﬂ
                ("\u{FB03}", "ffi"), // ﬃ
                ("\u{FB04}", "ffl"), // ﬄ
                ("\u{FB05}", "st"),  // ﬅ (long s + t)
                ("\u{FB06}", "st"),  // ﬆ
            ],
        }
    }

    /// NFC, ligature expansion, control/PUA stripping, whitespace collapsing.
    pub fn normalize(&self, text: &str) -> String {
        let mut result: String = text.nfc().collect();
        for (ligature, replacement) in &self.ligature_map {
            if result.contains(ligature) {
                result = result.replace(ligature, replacement);
            }
        }

        result
            .chars()
            .filter(|c| !is_private_use(*c) && *c != '\u{FFFD}')
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check whether normalized text is a bare page number or "Page n of m".
    pub fn is_page_number(&self, text: &str) -> bool {
        self.page_number.is_match(text)
            || self.page_of.is_match(text)
            || (!text.is_empty() && self.roman_page.is_match(text))
    }
}

fn is_private_use(c: char) -> bool {
    let code = c as u32;
    (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
}

/// Key under which repeated page furniture is compared.
pub(crate) fn repeat_key(text: &str) -> String {
    text.to_lowercase()
}

/// Drop blocks whose text recurs at roughly the same vertical position on
/// at least `repeat_min_pages` distinct pages.
pub(crate) fn remove_running_furniture(
    blocks: Vec<TextBlock>,
    options: &ProcessorOptions,
) -> Vec<TextBlock> {
    if options.repeat_min_pages == 0 {
        return blocks;
    }

    let mut by_text: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        by_text.entry(repeat_key(&block.text)).or_default().push(i);
    }

    let mut repeated: HashSet<usize> = HashSet::new();
    for indices in by_text.values() {
        if indices.len() < options.repeat_min_pages {
            continue;
        }
        for &i in indices {
            let anchor = blocks[i].bbox.y0;
            let pages: HashSet<u32> = indices
                .iter()
                .filter(|&&j| (blocks[j].bbox.y0 - anchor).abs() <= options.repeat_y_tolerance)
                .map(|&j| blocks[j].page)
                .collect();
            if pages.len() >= options.repeat_min_pages {
                repeated.insert(i);
            }
        }
    }

    if !repeated.is_empty() {
        log::debug!("Removing {} running header/footer blocks", repeated.len());
    }

    blocks
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !repeated.contains(i))
        .map(|(_, block)| block)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn block(text: &str, page: u32, y0: f32) -> TextBlock {
        TextBlock {
            text: text.to_string(),
            page,
            font_size: 9.0,
            is_bold: false,
            bbox: BBox::new(72.0, y0, 200.0, y0 + 9.0),
            block_index: 0,
        }
    }

    #[test]
    fn test_normalize() {
        let cleaner = TextCleaner::new();
        assert_eq!(cleaner.normalize("  ﬁnding \t ﬂowers\n"), "finding flowers");
        assert_eq!(cleaner.normalize("Cafe\u{0301}"), "Café");
        assert_eq!(cleaner.normalize("a\u{E000}b\u{FFFD}c"), "abc");
    }

    #[test]
    fn test_page_numbers() {
        let cleaner = TextCleaner::new();
        assert!(cleaner.is_page_number("12"));
        assert!(cleaner.is_page_number("- 3 -"));
        assert!(cleaner.is_page_number("Page 3 of 10"));
        assert!(cleaner.is_page_number("page 7"));
        assert!(cleaner.is_page_number("xiv"));
        assert!(!cleaner.is_page_number("1. Introduction"));
        assert!(!cleaner.is_page_number("Chapter 2"));
        assert!(!cleaner.is_page_number("civil"));
    }

    #[test]
    fn test_running_header_removed() {
        let blocks = vec![
            block("Confidential — Draft", 0, 20.0),
            block("Body", 0, 100.0),
            block("Confidential — Draft", 1, 20.5),
            block("Confidential — Draft", 2, 19.5),
        ];
        let kept = remove_running_furniture(blocks, &ProcessorOptions::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Body");
    }

    #[test]
    fn test_repeat_needs_matching_position() {
        let blocks = vec![
            block("Summary", 0, 20.0),
            block("Summary", 1, 300.0),
            block("Summary", 2, 600.0),
        ];
        assert_eq!(
            remove_running_furniture(blocks, &ProcessorOptions::default()).len(),
            3
        );
    }

    #[test]
    fn test_repeat_needs_enough_pages() {
        let blocks = vec![block("Header", 0, 20.0), block("Header", 1, 20.0)];
        assert_eq!(
            remove_running_furniture(blocks, &ProcessorOptions::default()).len(),
            2
        );
    }
}
