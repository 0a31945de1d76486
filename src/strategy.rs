//! Extraction strategies
//!
//! Both strategies read the first page through a [`PageSource`] and return an
//! [`Extraction`] or an error; turning errors into failure payloads is left to
//! the caller.

use crate::boundary::{find_header_boundary, header_blocks};
use crate::candidates::{fallback_candidate, harvest_candidates, select_best_candidate};
use crate::config::ExtractorConfig;
use crate::extractor::PageSource;
use crate::result::{Extraction, ExtractionMethod};
use crate::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Index of the page holding the invoice header
const FIRST_PAGE: usize = 0;

/// Any standalone digit run
static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]+\b").unwrap());

/// Something that can pull a TSP ID out of a document
pub trait IdentifierStrategy {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn extract(&self, source: &dyn PageSource) -> Result<Extraction, ExtractError>;
}

/// Strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Heading boundary plus candidate scoring, see [`LayoutBoundaryStrategy`]
    #[default]
    Layout,
    /// First exact-length digit run, see [`FirstMatchStrategy`]
    FirstMatch,
}

impl Strategy {
    pub fn build(self, config: ExtractorConfig) -> Box<dyn IdentifierStrategy> {
        match self {
            Strategy::Layout => Box::new(LayoutBoundaryStrategy::new(config)),
            Strategy::FirstMatch => Box::new(FirstMatchStrategy::new(config)),
        }
    }
}

/// Confidence for an identifier found by `method`
///
/// Base 0.98 for the boundary method and 0.85 for the fallback, plus a small
/// bonus for the more common shorter lengths.
pub fn calculate_confidence(tsp_id: &str, method: ExtractionMethod) -> f64 {
    let base: f64 = match method {
        ExtractionMethod::PositionBased => 0.98,
        ExtractionMethod::Fallback => 0.85,
        ExtractionMethod::FirstMatch => 0.95,
    };

    let bonus = match tsp_id.len() {
        6 => 0.01,
        7 => 0.005,
        8 => 0.002,
        _ => 0.0,
    };

    (base + bonus).clamp(0.0, 1.0)
}

/// Finds the summary heading and ranks the numbers above it
///
/// When the heading is missing the whole page is scanned instead and the
/// result is reported as [`ExtractionMethod::Fallback`].
#[derive(Debug, Clone, Default)]
pub struct LayoutBoundaryStrategy {
    config: ExtractorConfig,
}

impl LayoutBoundaryStrategy {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }
}

impl IdentifierStrategy for LayoutBoundaryStrategy {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn extract(&self, source: &dyn PageSource) -> Result<Extraction, ExtractError> {
        let layout = source.page_layout(FIRST_PAGE)?;
        if layout.is_empty() {
            return Err(ExtractError::NoText);
        }

        let Some(boundary) = find_header_boundary(
            &layout.blocks,
            &self.config.heading,
            &self.config.partial_heading,
        ) else {
            log::warn!("Summary boundary not found, using fallback method");
            let text = layout.joined_text();
            let tsp_id = fallback_candidate(&text)
                .ok_or(ExtractError::NoCandidateFound(ExtractionMethod::Fallback))?;

            return Ok(Extraction {
                tsp_id: tsp_id.to_string(),
                confidence: calculate_confidence(tsp_id, ExtractionMethod::Fallback),
                method: ExtractionMethod::Fallback,
            });
        };
        log::debug!("summary boundary at y={:.1}..{:.1}", boundary.y0, boundary.y1);

        let page_size = layout.page_size.unwrap_or(self.config.default_page_size);
        let header = header_blocks(&layout.blocks, &boundary);
        let candidates = harvest_candidates(&header, page_size, self.config.max_context_chars);
        log::debug!(
            "{} header blocks, {} candidates",
            header.len(),
            candidates.len()
        );

        let best = select_best_candidate(&candidates)
            .ok_or(ExtractError::NoCandidateFound(ExtractionMethod::PositionBased))?;

        Ok(Extraction {
            tsp_id: best.digits.clone(),
            confidence: calculate_confidence(&best.digits, ExtractionMethod::PositionBased),
            method: ExtractionMethod::PositionBased,
        })
    }
}

/// Returns the first digit run of exactly the configured length
///
/// No validation, scoring or layout. Confidence is reported as 1.0 by
/// convention and is not comparable with the layout strategy's.
#[derive(Debug, Clone, Default)]
pub struct FirstMatchStrategy {
    config: ExtractorConfig,
}

impl FirstMatchStrategy {
    /// Fixed confidence reported for a match
    pub const CONFIDENCE: f64 = 1.0;

    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// First run of `length` digits in `text`
    pub fn first_match(text: &str, length: usize) -> Option<&str> {
        DIGIT_RUN_RE
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|run| run.len() == length)
    }
}

impl IdentifierStrategy for FirstMatchStrategy {
    fn name(&self) -> &'static str {
        "first-match"
    }

    fn extract(&self, source: &dyn PageSource) -> Result<Extraction, ExtractError> {
        let text = source.page_text(FIRST_PAGE)?;
        if text.trim().is_empty() {
            return Err(ExtractError::NoText);
        }

        let tsp_id = Self::first_match(&text, self.config.first_match_length)
            .ok_or(ExtractError::NoCandidateFound(ExtractionMethod::FirstMatch))?;

        Ok(Extraction {
            tsp_id: tsp_id.to_string(),
            confidence: Self::CONFIDENCE,
            method: ExtractionMethod::FirstMatch,
        })
    }
}
