//! [`PageSource`] backed by `lopdf`.
//!
//! Walks each page's content stream, tracking the text matrix and font state,
//! and emits one [`TextRun`] per show-text operator.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use super::PageSource;
use crate::detect::sniff_path;
use crate::error::Result;
use crate::model::{BBox, PageRuns, TextRun};
use crate::processor::is_spaceless_script_char;

/// Default page height (US Letter) when the MediaBox is missing.
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// TJ adjustments beyond this many thousandths of an em read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Page source decoding PDF content streams with `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct LopdfSource;

impl LopdfSource {
    /// Create a new source.
    pub fn new() -> Self {
        Self
    }
}

impl PageSource for LopdfSource {
    fn load_pages(&self, path: &Path) -> Result<Vec<PageRuns>> {
        sniff_path(path)?;
        let doc = LopdfDocument::load(path)?;

        let pages = doc.get_pages();
        let mut result = Vec::with_capacity(pages.len());
        for (index, (page_num, page_id)) in pages.into_iter().enumerate() {
            let page = index as u32;
            let runs = match PageDecoder::new(&doc, page_id).decode() {
                Ok(runs) => runs,
                Err(e) => {
                    log::warn!(
                        "{}: page {} could not be decoded, skipping: {}",
                        path.display(),
                        page_num,
                        e
                    );
                    Vec::new()
                }
            };
            log::debug!("{}: page {} yielded {} runs", path.display(), page, runs.len());
            result.push(PageRuns::new(page, runs));
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

/// Decoder state for a single page.
struct PageDecoder<'a> {
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    page_height: f32,
}

impl<'a> PageDecoder<'a> {
    fn new(doc: &'a LopdfDocument, page_id: ObjectId) -> Self {
        Self {
            doc,
            page_id,
            page_height: page_height(doc, page_id),
        }
    }

    fn decode(&self) -> Result<Vec<TextRun>> {
        let fonts = self.doc.get_page_fonts(self.page_id)?;
        let base_fonts: BTreeMap<Vec<u8>, String> = fonts
            .iter()
            .map(|(name, dict)| (name.clone(), base_font_name(dict)))
            .collect();

        let content = self.doc.get_page_content(self.page_id)?;
        let content = lopdf::content::Content::decode(&content)?;

        let mut runs = Vec::new();
        let mut state = TextState::default();
        let mut font_resource: Vec<u8> = Vec::new();
        let mut base_font = String::new();
        let mut in_text = false;

        for op in content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "BT" => {
                    in_text = true;
                    state.begin_text();
                }
                "ET" => in_text = false,
                "Tf" if operands.len() >= 2 => {
                    if let Object::Name(name) = &operands[0] {
                        font_resource = name.clone();
                        base_font = base_fonts
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    }
                    state.font_size = number(&operands[1]).unwrap_or(12.0);
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" if operands.len() >= 2 => {
                    let tx = number(&operands[0]).unwrap_or(0.0);
                    let ty = number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
                "Tm" if operands.len() >= 6 => {
                    let m: Vec<f32> = operands
                        .iter()
                        .take(6)
                        .map(|o| number(o).unwrap_or(0.0))
                        .collect();
                    state.set_matrix([m[0], m[1], m[2], m[3], m[4], m[5]]);
                }
                "T*" => state.next_line(),
                "Tj" | "TJ" | "'" | "\"" if in_text => {
                    if op.operator == "'" || op.operator == "\"" {
                        state.next_line();
                    }
                    let text = match op.operator.as_str() {
                        "TJ" => match operands.first() {
                            Some(Object::Array(items)) => {
                                self.decode_array(&font_resource, &fonts, items)
                            }
                            _ => String::new(),
                        },
                        "\"" => self.decode_operand(&font_resource, &fonts, operands.get(2)),
                        _ => self.decode_operand(&font_resource, &fonts, operands.first()),
                    };
                    if let Some(run) = state.emit(&text, &base_font, self.page_height) {
                        runs.push(run);
                    }
                }
                _ => {}
            }
        }

        Ok(runs)
    }

    fn decode_operand(
        &self,
        font: &[u8],
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        operand: Option<&Object>,
    ) -> String {
        match operand {
            Some(Object::String(bytes, _)) => self.decode_bytes(font, fonts, bytes),
            _ => String::new(),
        }
    }

    /// TJ arrays interleave strings with kerning adjustments; large negative
    /// adjustments stand in for word spaces.
    fn decode_array(
        &self,
        font: &[u8],
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        items: &[Object],
    ) -> String {
        let mut combined = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    combined.push_str(&self.decode_bytes(font, fonts, bytes));
                }
                Object::Integer(_) | Object::Real(_) => {
                    let adjustment = -number(item).unwrap_or(0.0);
                    let needs_space = adjustment > TJ_SPACE_THRESHOLD
                        && combined
                            .chars()
                            .last()
                            .is_some_and(|c| !c.is_whitespace() && !is_spaceless_script_char(c));
                    if needs_space {
                        combined.push(' ');
                    }
                }
                _ => {}
            }
        }
        combined
    }

    fn decode_bytes(
        &self,
        font: &[u8],
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        bytes: &[u8],
    ) -> String {
        let decoded = fonts
            .get(font)
            .and_then(|dict| dict.get_font_encoding(self.doc).ok())
            .and_then(|encoding| LopdfDocument::decode_text(&encoding, bytes).ok());
        decoded.unwrap_or_else(|| decode_text_simple(bytes))
    }
}

/// Text object state: text matrix, line matrix and font parameters.
#[derive(Debug, Clone)]
struct TextState {
    tm: [f32; 6],
    line: [f32; 6],
    font_size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: IDENTITY,
            line: IDENTITY,
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl TextState {
    fn begin_text(&mut self) {
        self.tm = IDENTITY;
        self.line = IDENTITY;
    }

    fn set_matrix(&mut self, m: [f32; 6]) {
        self.tm = m;
        self.line = m;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line;
        self.line = [a, b, c, d, e + tx * a + ty * c, f + tx * b + ty * d];
        self.tm = self.line;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn effective_size(&self) -> f32 {
        let [_, _, c, d, _, _] = self.tm;
        self.font_size.abs() * (c * c + d * d).sqrt()
    }

    /// Build a run for `text` at the current position and advance past it.
    fn emit(&mut self, text: &str, base_font: &str, page_height: f32) -> Option<TextRun> {
        let size = self.effective_size();
        let chars = text.chars().count() as f32;
        let width = chars * size * 0.5;
        // Advance in text space, then map through the matrix.
        let advance = chars * self.font_size.abs() * 0.5;
        let [a, b, _, _, e, f] = self.tm;
        self.tm[4] = e + advance * a;
        self.tm[5] = f + advance * b;

        if text.trim().is_empty() {
            return None;
        }

        let bbox = BBox::new(
            e,
            page_height - (f + size * 0.8),
            e + width,
            page_height - (f - size * 0.2),
        );
        Some(TextRun::new(text, size, is_bold_font(base_font), bbox))
    }
}

/// Bold weight detected from the base font name (e.g. "Helvetica-Bold").
fn is_bold_font(base_font: &str) -> bool {
    let name = base_font.to_lowercase();
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|marker| name.contains(marker))
}

fn base_font_name(dict: &Dictionary) -> String {
    dict.get(b"BaseFont")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// MediaBox height, inherited from the page tree when the page has none.
fn page_height(doc: &LopdfDocument, page_id: ObjectId) -> f32 {
    let mut node = doc.get_dictionary(page_id).ok();
    for _ in 0..16 {
        let Some(dict) = node else {
            break;
        };
        let height = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|media_box| doc.dereference(media_box).ok())
            .and_then(|(_, media_box)| media_box.as_array().ok())
            .filter(|array| array.len() >= 4)
            .and_then(|array| {
                let y0 = number(&array[1])?;
                let y1 = number(&array[3])?;
                Some((y1 - y0).abs())
            });
        if let Some(height) = height {
            return height;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok()
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    DEFAULT_PAGE_HEIGHT
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decoding fallback when the font has no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // Latin-1
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
