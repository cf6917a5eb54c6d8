//! Grouping of runs into lines and of lines into blocks.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{BBox, TextRun};

use super::ProcessorOptions;

/// Runs sharing a baseline and horizontally contiguous.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub is_bold: bool,
}

impl Line {
    fn from_runs(runs: &[TextRun]) -> Self {
        let mut text = String::new();
        let mut bbox = runs[0].bbox;
        for (i, run) in runs.iter().enumerate() {
            if i > 0 && needs_space(&runs[i - 1], run) {
                text.push(' ');
            }
            text.push_str(&run.text);
            bbox = bbox.union(&run.bbox);
        }

        let (font_size, is_bold) = dominant_font(runs);
        Self {
            text,
            bbox,
            font_size,
            is_bold,
        }
    }

    fn center_x(&self) -> f32 {
        (self.bbox.x0 + self.bbox.x1) / 2.0
    }
}

/// Lines merged into one logical block, before noise filtering.
#[derive(Debug, Clone)]
pub(crate) struct RawBlock {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub is_bold: bool,
}

/// Sort runs into reading order and group them into lines.
pub(crate) fn group_runs_into_lines(runs: Vec<TextRun>, options: &ProcessorOptions) -> Vec<Line> {
    let mut runs: Vec<TextRun> = runs.into_iter().filter(TextRun::is_usable).collect();
    if runs.is_empty() {
        return vec![];
    }

    runs.sort_by(|a, b| {
        a.bbox
            .y1
            .partial_cmp(&b.bbox.y1)
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    // Rows: runs whose bottoms agree within 30% of the font size.
    let mut rows: Vec<Vec<TextRun>> = Vec::new();
    let mut row_bottom = f32::NAN;
    for run in runs {
        let tolerance = run.font_size * 0.3;
        match rows.last_mut() {
            Some(row) if (run.bbox.y1 - row_bottom).abs() <= tolerance => row.push(run),
            _ => {
                row_bottom = run.bbox.y1;
                rows.push(vec![run]);
            }
        }
    }

    let mut lines = Vec::new();
    for mut row in rows {
        row.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
        dedup_overprint(&mut row);

        let mut segment: Vec<TextRun> = Vec::new();
        for run in row {
            if let Some(prev) = segment.last() {
                let gap = run.bbox.x0 - prev.bbox.x1;
                if gap > options.max_word_gap * prev.font_size.max(run.font_size) {
                    lines.push(Line::from_runs(&segment));
                    segment.clear();
                }
            }
            segment.push(run);
        }
        if !segment.is_empty() {
            lines.push(Line::from_runs(&segment));
        }
    }

    lines
}

/// Merge consecutive lines that share font metadata and are contiguous.
pub(crate) fn group_lines_into_blocks(
    lines: Vec<Line>,
    options: &ProcessorOptions,
) -> Vec<RawBlock> {
    let mut blocks: Vec<RawBlock> = Vec::new();
    let mut current: Vec<Line> = Vec::new();

    for line in lines {
        let continues = current
            .last()
            .is_some_and(|prev| continues_block(prev, &line, options));
        if !continues && !current.is_empty() {
            blocks.push(merge_lines(std::mem::take(&mut current)));
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(merge_lines(current));
    }

    blocks
}

fn continues_block(prev: &Line, line: &Line, options: &ProcessorOptions) -> bool {
    if (prev.font_size - line.font_size).abs() > options.size_tolerance {
        return false;
    }
    if prev.is_bold != line.is_bold {
        return false;
    }

    let gap = line.bbox.y0 - prev.bbox.y1;
    let size = prev.font_size.max(line.font_size);
    if gap > options.line_gap_ratio * size || gap < -0.5 * size {
        return false;
    }

    // Left-aligned paragraphs or centered titles.
    (prev.bbox.x0 - line.bbox.x0).abs() <= options.indent_tolerance
        || (prev.center_x() - line.center_x()).abs() <= options.indent_tolerance
}

fn merge_lines(lines: Vec<Line>) -> RawBlock {
    let mut text = String::new();
    let mut bbox = lines[0].bbox;
    let mut weights: BTreeMap<i32, usize> = BTreeMap::new();
    let mut bold_chars = 0usize;
    let mut total_chars = 0usize;

    for line in &lines {
        join_line(&mut text, &line.text);
        bbox = bbox.union(&line.bbox);
        let chars = line.text.chars().count();
        *weights.entry(size_key(line.font_size)).or_insert(0) += chars;
        total_chars += chars;
        if line.is_bold {
            bold_chars += chars;
        }
    }

    RawBlock {
        text,
        bbox,
        font_size: modal_size(&weights).unwrap_or(lines[0].font_size),
        is_bold: total_chars > 0 && bold_chars * 2 > total_chars,
    }
}

/// Append a line, rejoining words hyphenated across the break.
fn join_line(text: &mut String, line: &str) {
    let line = line.trim();
    if text.is_empty() {
        text.push_str(line);
        return;
    }

    let hyphenated = text.ends_with('-')
        && text.chars().rev().nth(1).is_some_and(char::is_alphabetic)
        && line.chars().next().is_some_and(char::is_lowercase);
    if hyphenated {
        text.pop();
    } else if !text.ends_with(' ') {
        let joins_cjk = text.chars().last().is_some_and(is_spaceless_script_char)
            && line.chars().next().is_some_and(is_spaceless_script_char);
        if !joins_cjk {
            text.push(' ');
        }
    }
    text.push_str(line);
}

/// Some producers fake bold by printing the same run twice with a tiny offset.
fn dedup_overprint(row: &mut Vec<TextRun>) {
    row.dedup_by(|b, a| a.text == b.text && (a.bbox.x0 - b.bbox.x0).abs() < 1.0);
}

fn needs_space(prev: &TextRun, run: &TextRun) -> bool {
    if prev.text.ends_with(char::is_whitespace) || run.text.starts_with(char::is_whitespace) {
        return false;
    }

    let char_count = run.text.chars().count().max(1) as f32;
    let avg_char_width = if run.bbox.width() > 0.0 {
        run.bbox.width() / char_count
    } else {
        run.font_size * 0.5
    };
    let gap = run.bbox.x0 - prev.bbox.x1;
    if gap <= avg_char_width * 0.2 {
        return false;
    }

    let prev_cjk = prev.text.chars().last().is_some_and(is_spaceless_script_char);
    let curr_cjk = run.text.chars().next().is_some_and(is_spaceless_script_char);
    !(prev_cjk && curr_cjk)
}

/// Character-weighted modal font size and majority boldness.
fn dominant_font(runs: &[TextRun]) -> (f32, bool) {
    let mut weights: BTreeMap<i32, usize> = BTreeMap::new();
    let mut bold_chars = 0usize;
    let mut total_chars = 0usize;
    for run in runs {
        let chars = run.text.chars().filter(|c| !c.is_whitespace()).count();
        *weights.entry(size_key(run.font_size)).or_insert(0) += chars;
        total_chars += chars;
        if run.is_bold {
            bold_chars += chars;
        }
    }
    let size = modal_size(&weights).unwrap_or(runs[0].font_size);
    (size, total_chars > 0 && bold_chars * 2 > total_chars)
}

/// Font sizes are bucketed to 0.1pt.
pub(crate) fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Most frequent bucket; ties go to the larger size.
fn modal_size(weights: &BTreeMap<i32, usize>) -> Option<f32> {
    weights
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
        .map(|(key, _)| *key as f32 / 10.0)
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ProcessorOptions {
        ProcessorOptions::default()
    }

    #[test]
    fn test_runs_on_one_baseline_form_a_line() {
        let runs = vec![
            TextRun::at("world", 130.0, 100.0, 12.0, false),
            TextRun::at("Hello", 96.0, 100.0, 12.0, false),
        ];
        let lines = group_runs_into_lines(runs, &options());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello world");
    }

    #[test]
    fn test_adjacent_runs_join_without_space() {
        // "Hel" ends at 96 + 3*6 = 114
        let runs = vec![
            TextRun::at("Hel", 96.0, 100.0, 12.0, true),
            TextRun::at("lo", 114.0, 100.0, 12.0, true),
        ];
        let lines = group_runs_into_lines(runs, &options());
        assert_eq!(lines[0].text, "Hello");
        assert!(lines[0].is_bold);
    }

    #[test]
    fn test_distant_runs_split_into_segments() {
        let runs = vec![
            TextRun::at("Left", 50.0, 40.0, 10.0, false),
            TextRun::at("Right", 400.0, 40.0, 10.0, false),
        ];
        let lines = group_runs_into_lines(runs, &options());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_unusable_runs_dropped() {
        let runs = vec![
            TextRun::at("  ", 50.0, 40.0, 10.0, false),
            TextRun::at("x", 50.0, 40.0, f32::INFINITY, false),
        ];
        assert!(group_runs_into_lines(runs, &options()).is_empty());
    }

    #[test]
    fn test_dominant_font_is_weighted_by_chars() {
        let runs = vec![
            TextRun::at("1.", 50.0, 40.0, 18.0, true),
            TextRun::at("Introduction to things", 70.0, 40.0, 12.0, false),
        ];
        let (size, bold) = dominant_font(&runs);
        assert_eq!(size, 12.0);
        assert!(!bold);
    }

    #[test]
    fn test_paragraph_lines_merge() {
        let lines = group_runs_into_lines(
            vec![
                TextRun::at("The first line of a paragraph", 72.0, 100.0, 12.0, false),
                TextRun::at("continues on the next line", 72.0, 114.0, 12.0, false),
                TextRun::at("Heading", 72.0, 150.0, 16.0, true),
            ],
            &options(),
        );
        let blocks = group_lines_into_blocks(lines, &options());
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].text,
            "The first line of a paragraph continues on the next line"
        );
        assert_eq!(blocks[1].text, "Heading");
        assert!(blocks[1].is_bold);
    }

    #[test]
    fn test_large_gap_breaks_block() {
        let lines = group_runs_into_lines(
            vec![
                TextRun::at("Paragraph one", 72.0, 100.0, 12.0, false),
                TextRun::at("Paragraph two", 72.0, 140.0, 12.0, false),
            ],
            &options(),
        );
        assert_eq!(group_lines_into_blocks(lines, &options()).len(), 2);
    }

    #[test]
    fn test_hyphenation_rejoined() {
        let mut text = String::from("infor-");
        join_line(&mut text, "mation");
        assert_eq!(text, "information");

        let mut text = String::from("Pre-");
        join_line(&mut text, "Release");
        assert_eq!(text, "Pre- Release");
    }

    #[test]
    fn test_cjk_lines_join_without_space() {
        let mut text = String::from("日本語の");
        join_line(&mut text, "文章");
        assert_eq!(text, "日本語の文章");
    }

    #[test]
    fn test_overprinted_runs_deduplicated() {
        let runs = vec![
            TextRun::at("Bold", 72.0, 100.0, 12.0, false),
            TextRun::at("Bold", 72.3, 100.0, 12.0, false),
        ];
        let lines = group_runs_into_lines(runs, &options());
        assert_eq!(lines[0].text, "Bold");
    }
}
