//! Extraction settings

use crate::extractor::PageSize;

/// Heading that closes the invoice header section
pub const SUMMARY_HEADING: &str = "Summary of VIDAPAY Charges and Payments";

/// Shorter form of the heading, tried when the full one is absent
pub const SUMMARY_HEADING_PARTIAL: &str = "Summary of VIDAPAY";

/// Configuration for TSP ID extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Heading text searched first (exact substring match)
    pub heading: String,
    /// Heading text searched when `heading` is not found
    pub partial_heading: String,
    /// Page size used for position scoring when the page declares none
    pub default_page_size: PageSize,
    /// Spans with more characters than this are treated as prose, not an ID
    pub max_context_chars: usize,
    /// Digit count the first-match strategy looks for
    pub first_match_length: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            heading: SUMMARY_HEADING.to_string(),
            partial_heading: SUMMARY_HEADING_PARTIAL.to_string(),
            default_page_size: PageSize::US_LETTER,
            max_context_chars: 50,
            first_match_length: 6,
        }
    }
}
