//! Header boundary detection
//!
//! The TSP ID lives in the invoice header, which ends where the summary
//! heading starts. This module finds that heading and cuts the page down to
//! the blocks above it.

use crate::extractor::{TextBlock, TextLine};

/// Vertical extent of the recognized heading (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderBoundary {
    pub y0: f32,
    pub y1: f32,
}

/// Find the heading that closes the header section
///
/// Spans are scanned in document order for one whose trimmed text contains
/// `heading`; if none does, a second pass looks for `partial_heading`. The
/// first match in stream order wins, not the visually topmost one.
pub fn find_header_boundary(
    blocks: &[TextBlock],
    heading: &str,
    partial_heading: &str,
) -> Option<HeaderBoundary> {
    [heading, partial_heading]
        .into_iter()
        .filter(|needle| !needle.is_empty())
        .find_map(|needle| {
            blocks
                .iter()
                .flat_map(|b| b.spans())
                .find(|span| span.text.trim().contains(needle))
                .map(|span| HeaderBoundary {
                    y0: span.bbox.y0,
                    y1: span.bbox.y1,
                })
        })
}

/// Blocks strictly above the boundary, ordered top to bottom
///
/// A block that straddles the boundary keeps only the spans whose top edge is
/// above it.
pub fn header_blocks(blocks: &[TextBlock], boundary: &HeaderBoundary) -> Vec<TextBlock> {
    let mut header: Vec<TextBlock> = blocks
        .iter()
        .filter(|b| b.bbox.top() < boundary.y0)
        .filter_map(|block| {
            let lines = block
                .lines
                .iter()
                .filter_map(|line| {
                    let spans = line
                        .spans
                        .iter()
                        .filter(|s| s.bbox.top() < boundary.y0)
                        .cloned()
                        .collect();
                    TextLine::from_spans(spans)
                })
                .collect();
            TextBlock::from_lines(lines)
        })
        .collect();

    // Stable, so blocks sharing a top edge keep document order
    header.sort_by(|a, b| {
        a.bbox
            .top()
            .partial_cmp(&b.bbox.top())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    header
}
