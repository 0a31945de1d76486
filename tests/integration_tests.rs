//! Integration tests for tsp-extractor

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use tsp_extractor::candidates::MAX_ID_LENGTH;
use tsp_extractor::{
    extract_from_source, extract_tsp_id, extract_tsp_id_mem, extract_tsp_id_with, BBox,
    Envelope, ExtractError, ExtractionMethod, ExtractionResult, ExtractorConfig,
    FirstMatchStrategy, LayoutBoundaryStrategy, PageLayout, PageSize, PageSource, Strategy,
    TextSpan,
};

const HEADING: &str = "Summary of VIDAPAY Charges and Payments";

/// In-memory page source holding one page
struct StaticPage {
    spans: Vec<TextSpan>,
    text: String,
    page_size: Option<PageSize>,
}

impl StaticPage {
    fn from_spans(spans: Vec<TextSpan>) -> Self {
        let text = spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            spans,
            text,
            page_size: Some(PageSize::US_LETTER),
        }
    }

    fn from_text(text: &str) -> Self {
        Self {
            spans: Vec::new(),
            text: text.to_string(),
            page_size: Some(PageSize::US_LETTER),
        }
    }
}

impl PageSource for StaticPage {
    fn page_count(&self) -> usize {
        1
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout, ExtractError> {
        assert_eq!(index, 0);
        Ok(PageLayout::from_spans(self.spans.clone(), self.page_size))
    }

    fn page_text(&self, index: usize) -> Result<String, ExtractError> {
        assert_eq!(index, 0);
        Ok(self.text.clone())
    }
}

struct NoPages;

impl PageSource for NoPages {
    fn page_count(&self) -> usize {
        0
    }

    fn page_layout(&self, _index: usize) -> Result<PageLayout, ExtractError> {
        unreachable!("page count is checked first")
    }

    fn page_text(&self, _index: usize) -> Result<String, ExtractError> {
        unreachable!("page count is checked first")
    }
}

// Helper to create a span at (x, y0) with an estimated width
fn make_span(text: &str, x: f32, y: f32) -> TextSpan {
    TextSpan::new(
        text,
        BBox::new(x, y, x + text.len() as f32 * 6.0, y + 12.0),
    )
}

fn layout_result(spans: Vec<TextSpan>) -> ExtractionResult {
    extract_from_source(
        &StaticPage::from_spans(spans),
        &LayoutBoundaryStrategy::default(),
    )
}

fn success(result: &ExtractionResult) -> &tsp_extractor::TspIdReport {
    match result {
        ExtractionResult::Success(report) => report,
        ExtractionResult::Failure { error, .. } => panic!("expected success, got error: {}", error),
    }
}

/// Build a one-page PDF with each line drawn by its own text object.
/// Line positions are (x, top) with the origin at the top-left corner.
fn build_pdf(lines: &[(&str, f32, f32)]) -> Vec<u8> {
    build_pdf_with_pages(Some(line_operations(lines)))
}

fn line_operations(lines: &[(&str, f32, f32)]) -> Vec<Operation> {
    let mut operations = Vec::new();
    for (text, x, top) in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new(
            "Td",
            vec![Object::Real(*x), Object::Real(792.0 - top - 12.0)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    operations
}

fn build_pdf_with_pages(operations: Option<Vec<Operation>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    if let Some(operations) = operations {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn write_temp_pdf(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Layout Strategy Tests
// ============================================================================

#[test]
fn test_layout_heading_and_header_id() {
    let result = layout_result(vec![
        make_span("TSP 164082", 40.0, 50.0),
        make_span(HEADING, 40.0, 300.0),
    ]);

    let report = success(&result);
    assert_eq!(report.tsp_id, "164082");
    assert_eq!(report.method, ExtractionMethod::PositionBased);
    assert_eq!(report.page, 1);
    assert!((report.confidence - 0.99).abs() < 1e-9);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["tspId"], "164082");
    assert_eq!(json["method"], "position_based_extraction");
}

#[test]
fn test_layout_ignores_numbers_below_heading() {
    let result = layout_result(vec![
        make_span("Invoice", 40.0, 50.0),
        make_span(HEADING, 40.0, 300.0),
        make_span("Account 445566", 40.0, 340.0),
    ]);
    assert_eq!(
        result.error(),
        Some("No TSP ID found in header section")
    );
}

#[test]
fn test_layout_filters_dates_and_long_context() {
    let result = layout_result(vec![
        make_span("Invoice date 020125", 40.0, 40.0),
        make_span(
            "Questions about invoice 778899? Call our billing team any weekday",
            40.0,
            80.0,
        ),
        make_span("TSP 3456789", 400.0, 120.0),
        make_span(HEADING, 40.0, 300.0),
    ]);
    assert_eq!(result.tsp_id(), Some("3456789"));
}

#[test]
fn test_layout_prefers_terse_short_top_left_candidate() {
    let result = layout_result(vec![
        make_span("Customer reference no. 98765432", 40.0, 60.0),
        make_span("TSP 164082", 40.0, 80.0),
        make_span(HEADING, 40.0, 300.0),
    ]);
    assert_eq!(result.tsp_id(), Some("164082"));
}

#[test]
fn test_layout_uses_partial_heading() {
    let result = layout_result(vec![
        make_span("TSP 164082", 40.0, 50.0),
        make_span("Summary of VIDAPAY", 40.0, 200.0),
        make_span("Ref 556677", 40.0, 260.0),
    ]);
    let report = success(&result);
    assert_eq!(report.tsp_id, "164082");
    assert_eq!(report.method, ExtractionMethod::PositionBased);
}

#[test]
fn test_layout_custom_heading() {
    let config = ExtractorConfig {
        heading: "Account Activity".to_string(),
        partial_heading: String::new(),
        ..ExtractorConfig::default()
    };
    let result = extract_from_source(
        &StaticPage::from_spans(vec![
            make_span("Merchant 223344", 40.0, 50.0),
            make_span("Account Activity", 40.0, 150.0),
        ]),
        &LayoutBoundaryStrategy::new(config),
    );
    assert_eq!(result.tsp_id(), Some("223344"));
}

#[test]
fn test_layout_malformed_bbox_above_heading() {
    // Inverted box (x1 < x0): the position score falls back to neutral
    let result = layout_result(vec![
        TextSpan::new("TSP 164082", BBox::new(120.0, 50.0, 40.0, 62.0)),
        make_span(HEADING, 40.0, 300.0),
    ]);
    let report = success(&result);
    assert_eq!(report.tsp_id, "164082");
    assert_eq!(report.method, ExtractionMethod::PositionBased);
}

// ============================================================================
// Fallback Tests
// ============================================================================

#[test]
fn test_fallback_when_heading_missing() {
    let result = layout_result(vec![
        make_span("Statement 020125", 40.0, 50.0),
        make_span(
            "This long line mentions the merchant number 223344 in running prose",
            40.0,
            100.0,
        ),
    ]);

    let report = success(&result);
    assert_eq!(report.tsp_id, "223344");
    assert_eq!(report.method, ExtractionMethod::Fallback);
    assert_eq!(report.accuracy, "85%");
    assert!(report.confidence >= 0.85 && report.confidence < 0.98);
}

#[test]
fn test_fallback_nothing_found() {
    let result = layout_result(vec![make_span("Invoice 2077 of 06/02/2025", 40.0, 50.0)]);
    assert_eq!(result.error(), Some("No TSP ID found using fallback method"));
}

// ============================================================================
// First-Match Strategy Tests
// ============================================================================

#[test]
fn test_first_match_example() {
    let result = extract_from_source(
        &StaticPage::from_text("order 2077 dated 06/02/2025 ref 164082"),
        &FirstMatchStrategy::default(),
    );
    let report = success(&result);
    assert_eq!(report.tsp_id, "164082");
    assert_eq!(report.method, ExtractionMethod::FirstMatch);
    assert_eq!(report.confidence, 1.0);
    assert_eq!(report.accuracy, "100%");
}

#[test]
fn test_first_match_does_not_validate() {
    // A date-shaped run is still returned; this strategy has no validator
    let result = extract_from_source(
        &StaticPage::from_text("issued 020125 id 164082"),
        &FirstMatchStrategy::default(),
    );
    assert_eq!(result.tsp_id(), Some("020125"));
}

#[test]
fn test_first_match_empty_text() {
    let result = extract_from_source(&StaticPage::from_text("  \n "), &FirstMatchStrategy::default());
    assert_eq!(result.error(), Some("No text content found in PDF"));
}

#[test]
fn test_first_match_envelope() {
    let result = extract_from_source(
        &StaticPage::from_text("ref 164082"),
        &FirstMatchStrategy::default(),
    );
    let envelope = Envelope::from_result(&result, 2);
    assert!(envelope.success);
    assert_eq!(envelope.results.tsp_id.as_deref(), Some("164082"));
    assert_eq!(envelope.results.processing_time, "2ms");
    assert_eq!(envelope.results.library, "lopdf");
    assert!(envelope.error.is_none());
}

#[test]
fn test_first_match_miss_envelope_names_method() {
    let result = extract_from_source(
        &StaticPage::from_text("order 2077 dated 06/02/2025"),
        &FirstMatchStrategy::default(),
    );
    assert_eq!(result.error(), Some("No TSP ID found with first-match heuristic"));

    let envelope = Envelope::from_result(&result, 1);
    assert!(!envelope.success);
    assert_eq!(envelope.results.method, "first_match_extraction");
    assert_eq!(
        envelope.error.as_deref(),
        Some("No TSP ID found with first-match heuristic")
    );
}

#[test]
fn test_header_miss_envelope_names_method() {
    let result = layout_result(vec![
        make_span("Invoice", 40.0, 50.0),
        make_span(HEADING, 40.0, 300.0),
    ]);
    let envelope = Envelope::from_result(&result, 0);
    assert_eq!(envelope.results.method, "position_based_extraction");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json, serde_json::json!({ "error": "No TSP ID found in header section" }));
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_empty_layout_is_no_text() {
    let result = layout_result(vec![]);
    assert_eq!(result.error(), Some("No text content found in PDF"));
}

#[test]
fn test_no_pages() {
    for strategy in [Strategy::Layout, Strategy::FirstMatch] {
        let strategy = strategy.build(ExtractorConfig::default());
        let result = extract_from_source(&NoPages, strategy.as_ref());
        assert_eq!(result.error(), Some("Empty PDF document"));
    }
}

#[test]
fn test_nonexistent_file() {
    let result = extract_tsp_id("/nonexistent/invoice.pdf");
    assert!(!result.is_success());
    assert!(result.error().unwrap().starts_with("PDF open error"));
}

#[test]
fn test_corrupt_buffer() {
    let result = extract_tsp_id_mem(b"not a pdf at all", &LayoutBoundaryStrategy::default());
    assert!(result.error().unwrap().starts_with("PDF open error"));
}

// ============================================================================
// PDF End-to-End Tests
// ============================================================================

#[test]
fn test_pdf_layout_end_to_end() {
    let pdf = build_pdf(&[
        ("ACME Payments Inc.", 40.0, 30.0),
        ("TSP 164082", 40.0, 50.0),
        ("Invoice date 020125", 400.0, 50.0),
        (HEADING, 40.0, 300.0),
        ("Account 445566", 40.0, 340.0),
    ]);
    let file = write_temp_pdf(&pdf);

    let result = extract_tsp_id(file.path());
    let report = success(&result);
    assert_eq!(report.tsp_id, "164082");
    assert_eq!(report.method, ExtractionMethod::PositionBased);
}

#[test]
fn test_pdf_spans_have_top_left_coordinates() {
    let pdf = build_pdf(&[("TSP 164082", 40.0, 50.0), (HEADING, 40.0, 300.0)]);
    let doc = tsp_extractor::PdfDocument::load_mem(&pdf).unwrap();
    assert_eq!(doc.page_count(), 1);

    let layout = doc.page_layout(0).unwrap();
    assert_eq!(layout.page_size, Some(PageSize::US_LETTER));

    let spans: Vec<&TextSpan> = layout.spans().collect();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].text, "TSP 164082");
    assert!((spans[0].bbox.y0 - 50.0).abs() < 0.01);
    assert!((spans[0].bbox.x0 - 40.0).abs() < 0.01);
    assert!((spans[1].bbox.y0 - 300.0).abs() < 0.01);
}

#[test]
fn test_pdf_glyph_per_show_operator() {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![Object::Real(40.0), Object::Real(730.0)]),
        Operation::new("Tj", vec![Object::string_literal("TSP ")]),
    ];
    for digit in ["1", "6", "4", "0", "8", "2"] {
        operations.push(Operation::new("Tj", vec![Object::string_literal(digit)]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations.extend(line_operations(&[(HEADING, 40.0, 300.0)]));
    let pdf = build_pdf_with_pages(Some(operations));

    let doc = tsp_extractor::PdfDocument::load_mem(&pdf).unwrap();
    let layout = doc.page_layout(0).unwrap();
    assert_eq!(layout.blocks[0].lines[0].spans.len(), 1);
    assert_eq!(layout.blocks[0].lines[0].spans[0].text.trim(), "TSP 164082");

    let result = extract_tsp_id_mem(&pdf, &LayoutBoundaryStrategy::default());
    assert_eq!(result.tsp_id(), Some("164082"));
}

#[test]
fn test_pdf_fallback_end_to_end() {
    let pdf = build_pdf(&[("Statement 020125", 40.0, 50.0), ("Merchant 223344", 40.0, 90.0)]);
    let result = extract_tsp_id_mem(&pdf, &LayoutBoundaryStrategy::default());
    let report = success(&result);
    assert_eq!(report.tsp_id, "223344");
    assert_eq!(report.method, ExtractionMethod::Fallback);
}

#[test]
fn test_pdf_first_match_end_to_end() {
    let pdf = build_pdf(&[("order 2077 dated 06/02/2025 ref 164082", 40.0, 50.0)]);
    let file = write_temp_pdf(&pdf);

    let strategy = Strategy::FirstMatch.build(ExtractorConfig::default());
    let result = extract_tsp_id_with(file.path(), strategy.as_ref());
    assert_eq!(result.tsp_id(), Some("164082"));
}

#[test]
fn test_pdf_without_pages() {
    let pdf = build_pdf_with_pages(None);
    let result = extract_tsp_id_mem(&pdf, &LayoutBoundaryStrategy::default());
    assert_eq!(result.error(), Some("Empty PDF document"));
}

#[test]
fn test_pdf_without_text() {
    let pdf = build_pdf(&[]);
    let result = extract_tsp_id_mem(&pdf, &LayoutBoundaryStrategy::default());
    assert_eq!(result.error(), Some("No text content found in PDF"));
}

// ============================================================================
// Candidate Invariant Tests
// ============================================================================

#[test]
fn test_selected_id_length_in_range() {
    let result = layout_result(vec![
        make_span("123456789 12345 7654321", 40.0, 50.0),
        make_span(HEADING, 40.0, 300.0),
    ]);
    let id = result.tsp_id().unwrap();
    assert_eq!(id, "7654321");
    assert!(id.len() >= 6 && id.len() <= MAX_ID_LENGTH);
}
