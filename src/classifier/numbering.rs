//! Section numbering prefixes.

use regex::Regex;

/// Recognizes "1.2.3", "IV.", "Chapter 3", "Appendix A" style prefixes.
#[derive(Debug, Clone)]
pub struct NumberingPattern {
    decimal: Regex,
    roman: Regex,
    named: Regex,
    appendix: Regex,
}

impl NumberingPattern {
    /// Compile the prefix patterns.
    pub fn new() -> Self {
        Self {
            decimal: Regex::new(r"^(\d{1,3}(?:\.\d{1,3})*)\.?\)?\s+\p{L}").unwrap(),
            roman: Regex::new(r"^[IVXLC]{1,6}[.)]\s+\p{L}").unwrap(),
            named: Regex::new(r"(?i)^(chapter|section|part)\s+(\d+|[ivxlc]+)\b").unwrap(),
            appendix: Regex::new(r"(?i)^appendix\s+[a-z0-9]{1,3}\b").unwrap(),
        }
    }

    /// Depth implied by the prefix: "2" is 1, "2.1" is 2, named sections
    /// and roman numerals are 1. `None` when the text has no prefix.
    pub fn depth(&self, text: &str) -> Option<usize> {
        if let Some(caps) = self.decimal.captures(text) {
            return Some(caps[1].split('.').count());
        }
        if self.roman.is_match(text) || self.named.is_match(text) || self.appendix.is_match(text) {
            return Some(1);
        }
        None
    }
}

impl Default for NumberingPattern {
    fn default() -> Self {
        Self::new()
    }
}
