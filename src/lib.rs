//! TSP ID extraction from PDF invoices using lopdf
//!
//! This crate provides:
//! - Positioned text extraction for the first page of a PDF
//! - Location of the summary heading that closes the invoice header
//! - Candidate harvesting, validation and scoring for the 6-8 digit TSP ID
//! - A simpler first-match strategy over flat page text

pub mod boundary;
pub mod candidates;
pub mod config;
pub mod extractor;
pub mod result;
pub mod strategy;

pub use config::ExtractorConfig;
pub use extractor::{BBox, PageLayout, PageSize, PageSource, PdfDocument, TextBlock, TextLine, TextSpan};
pub use result::{Envelope, Extraction, ExtractionMethod, ExtractionResult, TspIdReport};
pub use strategy::{FirstMatchStrategy, IdentifierStrategy, LayoutBoundaryStrategy, Strategy};

use std::path::Path;

/// Extract the TSP ID from a PDF file with the layout strategy and default settings
pub fn extract_tsp_id<P: AsRef<Path>>(path: P) -> ExtractionResult {
    extract_tsp_id_with(path, &LayoutBoundaryStrategy::default())
}

/// Extract the TSP ID from a PDF file with the given strategy
///
/// Never fails: every error is reported as [`ExtractionResult::Failure`]. The
/// document is released before this returns, whatever the outcome.
pub fn extract_tsp_id_with<P: AsRef<Path>>(
    path: P,
    strategy: &dyn IdentifierStrategy,
) -> ExtractionResult {
    let path = path.as_ref();
    log::info!("Processing PDF: {}", path.display());

    let outcome = PdfDocument::open(path).and_then(|doc| run_strategy(&doc, strategy));
    into_result(outcome)
}

/// Extract the TSP ID from a PDF held in memory
pub fn extract_tsp_id_mem(buffer: &[u8], strategy: &dyn IdentifierStrategy) -> ExtractionResult {
    let outcome = PdfDocument::load_mem(buffer).and_then(|doc| run_strategy(&doc, strategy));
    into_result(outcome)
}

/// Run a strategy against any page source
pub fn extract_from_source(
    source: &dyn PageSource,
    strategy: &dyn IdentifierStrategy,
) -> ExtractionResult {
    into_result(run_strategy(source, strategy))
}

fn run_strategy(
    source: &dyn PageSource,
    strategy: &dyn IdentifierStrategy,
) -> Result<Extraction, ExtractError> {
    if source.page_count() == 0 {
        return Err(ExtractError::EmptyDocument);
    }
    log::debug!("running {} strategy", strategy.name());
    strategy.extract(source)
}

fn into_result(outcome: Result<Extraction, ExtractError>) -> ExtractionResult {
    match outcome {
        Ok(extraction) => {
            log::info!(
                "Successfully extracted TSP ID: {} ({})",
                extraction.tsp_id,
                extraction.method.tag()
            );
            extraction.into()
        }
        Err(e) => {
            log::error!("TSP ID extraction failed: {}", e);
            ExtractionResult::Failure {
                error: e.to_string(),
                method: e.searched_method(),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF open error: {0}")]
    DocumentOpen(String),
    #[error("Empty PDF document")]
    EmptyDocument,
    #[error("No text content found in PDF")]
    NoText,
    #[error("No TSP ID found {}", .0.search_scope())]
    NoCandidateFound(ExtractionMethod),
    #[error("PDF processing error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// The extraction method that ran to completion without a match
    pub fn searched_method(&self) -> Option<ExtractionMethod> {
        match self {
            ExtractError::NoCandidateFound(method) => Some(*method),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for ExtractError {
    fn from(e: lopdf::Error) -> Self {
        ExtractError::DocumentOpen(e.to_string())
    }
}
