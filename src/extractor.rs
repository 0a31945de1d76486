//! Positioned text extraction from PDF using lopdf
//!
//! This module is the only place that talks to the PDF library. It turns the
//! content stream of a page into spans with bounding boxes (origin at the
//! top-left corner, y growing downward), groups them into lines and blocks,
//! and exposes the result through the [`PageSource`] trait the extraction
//! strategies consume.

use crate::ExtractError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Average glyph advance as a fraction of the font size, used to estimate span width
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Portion of the font size that hangs below the baseline
const DESCENT_RATIO: f32 = 0.2;

/// Spans whose baselines differ by less than this are on the same line
const LINE_Y_TOLERANCE: f32 = 3.0;

/// Baseline gap (in multiples of the font size) that starts a new block
const BLOCK_GAP_FACTOR: f32 = 1.8;

/// Horizontal gap (in multiples of the font size) up to which same-font
/// fragments on a line are merged into one span
const FRAGMENT_JOIN_FACTOR: f32 = 1.0;

/// Fragments closer than this (in multiples of the font size) join without a space
const WORD_GAP_FACTOR: f32 = 0.15;

/// Axis-aligned bounding box in page coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Top edge (smallest y, since y grows downward)
    pub fn top(&self) -> f32 {
        self.y0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// All coordinates finite and the box not inverted
    pub fn is_well_formed(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 >= self.x0
            && self.y1 >= self.y0
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Physical page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// 8.5 x 11 inches
    pub const US_LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };
}

/// A fragment of text with its bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content as drawn
    pub text: String,
    /// Bounding box, top-left origin
    pub bbox: BBox,
    /// Font resource name
    pub font: String,
    /// Rendered font size
    pub font_size: f32,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            font: String::new(),
            font_size: bbox.height(),
        }
    }
}

/// A line of text (spans sharing a baseline)
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    pub bbox: BBox,
}

impl TextLine {
    /// Build a line, computing its bounding box from the spans.
    /// Returns `None` for an empty span list.
    pub fn from_spans(spans: Vec<TextSpan>) -> Option<Self> {
        let bbox = union_all(spans.iter().map(|s| s.bbox))?;
        Some(Self { spans, bbox })
    }

    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn font_size(&self) -> f32 {
        self.spans.iter().map(|s| s.font_size).fold(0.0, f32::max)
    }
}

/// A group of consecutive, closely spaced lines
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub bbox: BBox,
}

impl TextBlock {
    /// Build a block, computing its bounding box from the lines.
    /// Returns `None` for an empty line list.
    pub fn from_lines(lines: Vec<TextLine>) -> Option<Self> {
        let bbox = union_all(lines.iter().map(|l| l.bbox))?;
        Some(Self { lines, bbox })
    }

    /// Spans of the block in document order
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.lines.iter().flat_map(|l| l.spans.iter())
    }
}

/// Positioned text of a single page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    /// Page dimensions from the MediaBox, if the page declares one
    pub page_size: Option<PageSize>,
    pub blocks: Vec<TextBlock>,
}

impl PageLayout {
    /// Group spans (in document order) into lines and blocks
    pub fn from_spans(spans: Vec<TextSpan>, page_size: Option<PageSize>) -> Self {
        let lines = group_into_lines(spans);
        Self {
            page_size,
            blocks: group_into_blocks(lines),
        }
    }

    /// All spans of the page in document order
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.blocks.iter().flat_map(|b| b.spans())
    }

    pub fn is_empty(&self) -> bool {
        self.spans().all(|s| s.text.trim().is_empty())
    }

    /// Every span's text followed by a single space
    pub fn joined_text(&self) -> String {
        let mut text = String::new();
        for span in self.spans() {
            text.push_str(&span.text);
            text.push(' ');
        }
        text
    }
}

/// Access to the text of a document's pages
///
/// [`PdfDocument`] implements this over lopdf; tests and callers holding
/// already-parsed text can provide their own implementation.
pub trait PageSource {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// Positioned text of the page at `index` (0-based)
    fn page_layout(&self, index: usize) -> Result<PageLayout, ExtractError>;

    /// Flat text of the page at `index` (0-based)
    fn page_text(&self, index: usize) -> Result<String, ExtractError>;
}

/// A loaded PDF document
///
/// The underlying document is released when this value is dropped, so every
/// exit path of a caller's scope frees it.
pub struct PdfDocument {
    doc: Document,
    /// (1-indexed page number, page object) in page order
    pages: Vec<(u32, ObjectId)>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl PdfDocument {
    /// Open a PDF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let doc = Document::load(path)?;
        Ok(Self::from_document(doc))
    }

    /// Load a PDF from a memory buffer
    pub fn load_mem(buffer: &[u8]) -> Result<Self, ExtractError> {
        let doc = Document::load_mem(buffer)?;
        Ok(Self::from_document(doc))
    }

    fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages().into_iter().collect();
        Self { doc, pages }
    }

    fn page(&self, index: usize) -> Result<(u32, ObjectId), ExtractError> {
        self.pages.get(index).copied().ok_or_else(|| {
            ExtractError::Internal(format!(
                "page index {} out of range ({} pages)",
                index,
                self.pages.len()
            ))
        })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout, ExtractError> {
        let (_, page_id) = self.page(index)?;
        let media_box = page_media_box(&self.doc, page_id);
        let spans = extract_page_spans(&self.doc, page_id, media_box)?;
        log::debug!("page {}: {} positioned spans", index + 1, spans.len());
        Ok(PageLayout::from_spans(spans, media_box.map(|m| m.size())))
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        let (page_num, _) = self.page(index)?;
        match self.doc.extract_text(&[page_num]) {
            Ok(text) => Ok(text),
            Err(e) => {
                // Fonts lopdf cannot decode for plain text may still yield spans
                log::warn!("flat text extraction failed ({}), rebuilding from spans", e);
                let layout = self.page_layout(index)?;
                Ok(layout
                    .blocks
                    .iter()
                    .flat_map(|b| b.lines.iter())
                    .map(|l| l.text())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}

/// Page boundaries in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy)]
struct MediaBox {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl MediaBox {
    fn size(&self) -> PageSize {
        PageSize {
            width: (self.urx - self.llx).abs(),
            height: (self.ury - self.lly).abs(),
        }
    }
}

/// Look up the page's MediaBox, walking up the page tree for inherited values
fn page_media_box(doc: &Document, page_id: ObjectId) -> Option<MediaBox> {
    let mut dict: &Dictionary = doc.get_dictionary(page_id).ok()?;

    // Bounded walk; malformed trees can contain Parent cycles
    for _ in 0..32 {
        if let Ok(obj) = dict.get(b"MediaBox") {
            let obj = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            let values: Vec<f32> = obj.as_array().ok()?.iter().filter_map(get_number).collect();
            if values.len() != 4 {
                return None;
            }
            return Some(MediaBox {
                llx: values[0].min(values[2]),
                lly: values[1].min(values[3]),
                urx: values[0].max(values[2]),
                ury: values[1].max(values[3]),
            });
        }
        let parent = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Text state while walking a content stream
struct TextState {
    font: String,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
}

impl TextState {
    fn new() -> Self {
        Self {
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2 // Approximate line height
        };
        self.move_line(0.0, -leading);
    }

    /// Start a new line offset by (tx, ty) in text space: Tlm = [1 0 0 1 tx ty] x Tlm
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Advance past a shown string using the estimated glyph widths
    fn advance(&mut self, text: &str) {
        let tx = text.chars().count() as f32 * self.font_size * AVG_GLYPH_WIDTH;
        self.text_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.text_matrix);
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Extract positioned spans from a single page, in content stream order
fn extract_page_spans(
    doc: &Document,
    page_id: ObjectId,
    media_box: Option<MediaBox>,
) -> Result<Vec<TextSpan>, ExtractError> {
    use lopdf::content::Content;

    let mut spans = Vec::new();

    // Coordinates are flipped against the page top; assume Letter when undeclared
    let frame = media_box.unwrap_or(MediaBox {
        llx: 0.0,
        lly: 0.0,
        urx: PageSize::US_LETTER.width,
        ury: PageSize::US_LETTER.height,
    });

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| ExtractError::Internal(e.to_string()))?;

    let content =
        Content::decode(&content_data).map_err(|e| ExtractError::Internal(e.to_string()))?;

    // Graphics state tracking
    let mut ctm = IDENTITY;
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();

    let mut state = TextState::new();
    let mut in_text_block = false;

    for op in &content.operations {
        let mut shown: Option<String> = None;

        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    ctm = multiply_matrices(&new_matrix, &ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        state.text_matrix[i] = get_number(operand)
                            .unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    state.line_matrix = state.text_matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if in_text_block {
                    shown = op
                        .operands
                        .first()
                        .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
                }
            }
            "TJ" => {
                if in_text_block {
                    if let Some(Ok(array)) = op.operands.first().map(|o| o.as_array()) {
                        let mut combined_text = String::new();
                        for item in array {
                            if let Some(text) = decode_operand(item, doc, &fonts, &state.font) {
                                combined_text.push_str(&text);
                            }
                        }
                        shown = Some(combined_text);
                    }
                }
            }
            "'" => {
                state.next_line();
                shown = op
                    .operands
                    .first()
                    .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
            }
            "\"" => {
                state.next_line();
                shown = op
                    .operands
                    .get(2)
                    .and_then(|o| decode_operand(o, doc, &fonts, &state.font));
            }
            _ => {}
        }

        if let Some(text) = shown {
            if !text.trim().is_empty() {
                spans.push(positioned_span(text.clone(), &state, &ctm, &frame));
            }
            state.advance(&text);
        }
    }

    Ok(spans)
}

/// Place a shown string on the page using the current text and graphics state
fn positioned_span(text: String, state: &TextState, ctm: &[f32; 6], frame: &MediaBox) -> TextSpan {
    let rendered_size = effective_font_size(state.font_size, &state.text_matrix);
    let combined = multiply_matrices(&state.text_matrix, ctm);
    let x = combined[4] - frame.llx;
    let baseline = frame.ury - combined[5];
    let width = text.chars().count() as f32 * rendered_size * AVG_GLYPH_WIDTH;

    TextSpan {
        bbox: BBox::new(
            x,
            baseline - rendered_size,
            x + width,
            baseline + rendered_size * DESCENT_RATIO,
        ),
        text,
        font: state.font.clone(),
        font_size: rendered_size,
    }
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Decode a string operand, handling the font's encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // Fallback: try UTF-16BE then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

fn union_all(mut boxes: impl Iterator<Item = BBox>) -> Option<BBox> {
    let first = boxes.next()?;
    Some(boxes.fold(first, |acc, b| acc.union(&b)))
}

/// Group spans into lines
/// Preserves stream order and only merges consecutive spans on the same
/// baseline; spans within a line are ordered left to right, and adjacent
/// fragments drawn in the same font are merged into a single span.
pub fn group_into_lines(spans: Vec<TextSpan>) -> Vec<TextLine> {
    let mut groups: Vec<Vec<TextSpan>> = Vec::new();

    for span in spans {
        let same_line = groups
            .last()
            .and_then(|g| g.last())
            .is_some_and(|prev| (prev.bbox.y1 - span.bbox.y1).abs() < LINE_Y_TOLERANCE);

        match groups.last_mut() {
            Some(group) if same_line => group.push(span),
            _ => groups.push(vec![span]),
        }
    }

    groups
        .into_iter()
        .filter_map(|mut group| {
            group.sort_by(|a, b| {
                a.bbox
                    .x0
                    .partial_cmp(&b.bbox.x0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            TextLine::from_spans(merge_fragments(group))
        })
        .collect()
}

/// Merge left-to-right sorted spans that continue each other in the same font
///
/// Producers that draw one glyph or word per show operator would otherwise
/// split identifiers across spans.
fn merge_fragments(spans: Vec<TextSpan>) -> Vec<TextSpan> {
    let mut merged: Vec<TextSpan> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(prev) = merged.last_mut() {
            let size = prev.font_size.max(span.font_size).max(1.0);
            let gap = span.bbox.x0 - prev.bbox.x1;
            let same_font =
                prev.font == span.font && (prev.font_size - span.font_size).abs() < 0.5;

            if same_font && gap <= size * FRAGMENT_JOIN_FACTOR {
                if gap >= size * WORD_GAP_FACTOR
                    && !prev.text.ends_with(' ')
                    && !span.text.starts_with(' ')
                {
                    prev.text.push(' ');
                }
                prev.text.push_str(&span.text);
                prev.bbox = prev.bbox.union(&span.bbox);
                continue;
            }
        }
        merged.push(span);
    }

    merged
}

/// Group consecutive lines into blocks
/// A new block starts when the baseline gap exceeds `BLOCK_GAP_FACTOR` times
/// the font size, or when the stream jumps back up the page.
pub fn group_into_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let mut groups: Vec<Vec<TextLine>> = Vec::new();

    for line in lines {
        let continues = groups.last().and_then(|g| g.last()).is_some_and(|prev| {
            let gap = line.bbox.y1 - prev.bbox.y1;
            let size = prev.font_size().max(line.font_size()).max(1.0);
            gap >= 0.0 && gap <= size * BLOCK_GAP_FACTOR
        });

        match groups.last_mut() {
            Some(group) if continues => group.push(line),
            _ => groups.push(vec![line]),
        }
    }

    groups.into_iter().filter_map(TextBlock::from_lines).collect()
}
