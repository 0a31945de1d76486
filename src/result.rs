//! Extraction results and their JSON shapes

use serde::Serialize;

/// Library name reported in the envelope
pub const LIBRARY: &str = "lopdf";

/// How an identifier was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionMethod {
    /// Header section above the summary heading, ranked by position
    #[serde(rename = "position_based_extraction")]
    PositionBased,
    /// Whole-page scan when the heading is missing
    #[serde(rename = "fallback_extraction")]
    Fallback,
    /// First exact-length digit run in the flat text
    #[serde(rename = "first_match_extraction")]
    FirstMatch,
}

impl ExtractionMethod {
    /// Tag written to the `method` field
    pub fn tag(&self) -> &'static str {
        match self {
            ExtractionMethod::PositionBased => "position_based_extraction",
            ExtractionMethod::Fallback => "fallback_extraction",
            ExtractionMethod::FirstMatch => "first_match_extraction",
        }
    }

    /// Engine description written to `extraction_method`
    pub fn engine_label(&self) -> &'static str {
        match self {
            ExtractionMethod::PositionBased => "lopdf Layout Analysis",
            ExtractionMethod::Fallback => "lopdf Fallback",
            ExtractionMethod::FirstMatch => "lopdf Text Scan",
        }
    }

    /// Where the method looked, as worded in "No TSP ID found ..." errors
    pub fn search_scope(&self) -> &'static str {
        match self {
            ExtractionMethod::PositionBased => "in header section",
            ExtractionMethod::Fallback => "using fallback method",
            ExtractionMethod::FirstMatch => "with first-match heuristic",
        }
    }

    /// Nominal accuracy of the method
    ///
    /// These are fixed labels attached to each method, not measurements.
    pub fn accuracy_label(&self) -> &'static str {
        match self {
            ExtractionMethod::PositionBased | ExtractionMethod::FirstMatch => "100%",
            ExtractionMethod::Fallback => "85%",
        }
    }

    pub fn describe(&self, tsp_id: &str) -> String {
        match self {
            ExtractionMethod::PositionBased => format!(
                "TSP ID '{}' found in header section using position analysis",
                tsp_id
            ),
            ExtractionMethod::Fallback => {
                format!("TSP ID '{}' found using fallback method", tsp_id)
            }
            ExtractionMethod::FirstMatch => {
                format!("TSP ID '{}' is the first 6-digit number on the page", tsp_id)
            }
        }
    }
}

/// Identifier found by a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub tsp_id: String,
    pub confidence: f64,
    pub method: ExtractionMethod,
}

/// Success payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TspIdReport {
    #[serde(rename = "tspId")]
    pub tsp_id: String,
    pub confidence: f64,
    pub method: ExtractionMethod,
    pub page: u32,
    pub description: String,
    pub extraction_method: String,
    pub accuracy: String,
}

/// Outcome of one extraction call
///
/// Serializes either as the success payload or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Success(TspIdReport),
    Failure {
        error: String,
        /// Method that ran and came up empty; only carried into the envelope
        #[serde(skip)]
        method: Option<ExtractionMethod>,
    },
}

impl ExtractionResult {
    pub fn failure(error: impl std::fmt::Display) -> Self {
        ExtractionResult::Failure {
            error: error.to_string(),
            method: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success(_))
    }

    pub fn tsp_id(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success(report) => Some(&report.tsp_id),
            ExtractionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExtractionResult::Success(_) => None,
            ExtractionResult::Failure { error, .. } => Some(error),
        }
    }
}

impl From<Extraction> for ExtractionResult {
    fn from(extraction: Extraction) -> Self {
        let method = extraction.method;
        ExtractionResult::Success(TspIdReport {
            description: method.describe(&extraction.tsp_id),
            tsp_id: extraction.tsp_id,
            confidence: extraction.confidence,
            method,
            page: 1,
            extraction_method: method.engine_label().to_string(),
            accuracy: method.accuracy_label().to_string(),
        })
    }
}

/// Inner record of the envelope format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeResults {
    #[serde(rename = "tspId")]
    pub tsp_id: Option<String>,
    pub confidence: f64,
    pub method: String,
    pub description: String,
    pub accuracy: String,
    #[serde(rename = "extractedText")]
    pub extracted_text: String,
    #[serde(rename = "processingTime")]
    pub processing_time: String,
    pub library: String,
}

/// Wrapper format: `{success, results, error?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub results: EnvelopeResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Wrap a result, reporting `processing_time_ms` as the processing time
    pub fn from_result(result: &ExtractionResult, processing_time_ms: u64) -> Self {
        let processing_time = format!("{}ms", processing_time_ms);

        match result {
            ExtractionResult::Success(report) => Envelope {
                success: true,
                results: EnvelopeResults {
                    tsp_id: Some(report.tsp_id.clone()),
                    confidence: report.confidence,
                    method: report.method.tag().to_string(),
                    description: report.description.clone(),
                    accuracy: report.accuracy.clone(),
                    extracted_text: format!("TSP ID: {}", report.tsp_id),
                    processing_time,
                    library: LIBRARY.to_string(),
                },
                error: None,
            },
            ExtractionResult::Failure { error, method } => {
                Self::failure(error, *method, processing_time)
            }
        }
    }

    /// Envelope for a failed call
    ///
    /// `method` is the extraction method that searched without finding an
    /// identifier; failures before any search ran are tagged `"error"`.
    pub fn failure(
        error: &str,
        method: Option<ExtractionMethod>,
        processing_time: String,
    ) -> Self {
        Envelope {
            success: false,
            results: EnvelopeResults {
                tsp_id: None,
                confidence: 0.0,
                method: method.map_or("error", |m| m.tag()).to_string(),
                description: error.to_string(),
                accuracy: "0%".to_string(),
                extracted_text: String::new(),
                processing_time,
                library: LIBRARY.to_string(),
            },
            error: Some(error.to_string()),
        }
    }
}
