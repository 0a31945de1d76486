//! TSP ID candidate harvesting, validation and ranking

use crate::extractor::{BBox, PageSize, TextBlock};
use crate::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest digit run that can be a TSP ID
pub const MIN_ID_LENGTH: usize = 6;
/// Longest digit run that can be a TSP ID
pub const MAX_ID_LENGTH: usize = 8;

/// Score used when a span's position cannot be computed
pub const NEUTRAL_POSITION_SCORE: f32 = 0.5;

const POSITION_WEIGHT: f32 = 0.4;

/// Standalone 6-8 digit runs
static ID_PATTERN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{6,8}\b").unwrap());

/// A possible TSP ID found in the header
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The digit run
    pub digits: String,
    /// Trimmed text of the span it came from
    pub context: String,
    /// Bounding box of the originating span
    pub bbox: BBox,
    /// Top-left preference in [0, 1]
    pub position_score: f32,
}

/// Why a digit string was ruled out as a TSP ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotNumeric,
    Length,
    TooSmall,
    PhoneNumber,
    Date,
    ZipCode,
    ContextTooLong,
}

/// Check a digit string against the TSP ID rules
///
/// `context` is the text of the span the digits came from; pass an empty
/// string when there is none.
pub fn validate_candidate(
    digits: &str,
    context: &str,
    max_context_chars: usize,
) -> Result<(), Rejection> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Rejection::NotNumeric);
    }
    if !(MIN_ID_LENGTH..=MAX_ID_LENGTH).contains(&digits.len()) {
        return Err(Rejection::Length);
    }
    if digits.parse::<u64>().map_or(true, |v| v < 100_000) {
        return Err(Rejection::TooSmall);
    }
    if is_likely_phone_number(digits) {
        return Err(Rejection::PhoneNumber);
    }
    if is_likely_date(digits) {
        return Err(Rejection::Date);
    }
    if is_likely_zip_code(digits) {
        return Err(Rejection::ZipCode);
    }
    if context.trim().chars().count() > max_context_chars {
        return Err(Rejection::ContextTooLong);
    }
    Ok(())
}

/// Boolean form of [`validate_candidate`]
pub fn is_valid_candidate(digits: &str, context: &str, max_context_chars: usize) -> bool {
    validate_candidate(digits, context, max_context_chars).is_ok()
}

/// 10 or 11 digits starting with 0 or 1
pub fn is_likely_phone_number(digits: &str) -> bool {
    matches!(digits.len(), 10 | 11) && (digits.starts_with('0') || digits.starts_with('1'))
}

/// MMDDYY for 6 digits, YYYYMMDD for 8
pub fn is_likely_date(digits: &str) -> bool {
    let field = |range: std::ops::Range<usize>| digits.get(range).and_then(|s| s.parse::<u32>().ok());

    match digits.len() {
        6 => match (field(0..2), field(2..4), field(4..6)) {
            (Some(month), Some(day), Some(year)) => {
                (1..=12).contains(&month) && (1..=31).contains(&day) && year <= 99
            }
            _ => false,
        },
        8 => match (field(0..4), field(4..6), field(6..8)) {
            (Some(year), Some(month), Some(day)) => {
                (1900..=2100).contains(&year) && (1..=12).contains(&month) && (1..=31).contains(&day)
            }
            _ => false,
        },
        _ => false,
    }
}

/// 5-digit or ZIP+4 value inside the assigned US ranges
pub fn is_likely_zip_code(digits: &str) -> bool {
    let Ok(value) = digits.parse::<u64>() else {
        return false;
    };
    match digits.len() {
        5 => (501..=99_950).contains(&value),
        9 => (50_100_000..=999_509_999).contains(&value),
        _ => false,
    }
}

/// Score a span's placement, favoring the top-left corner
///
/// Both coordinates are normalized against the page size and the two
/// complements averaged; the result is clamped to [0, 1].
pub fn position_score(bbox: &BBox, page: PageSize) -> Result<f32, ExtractError> {
    if !bbox.is_well_formed() {
        return Err(ExtractError::Internal(format!(
            "malformed bounding box {:?}",
            bbox
        )));
    }
    if !(page.width > 0.0 && page.height > 0.0) {
        return Err(ExtractError::Internal(format!(
            "invalid page size {}x{}",
            page.width, page.height
        )));
    }

    let x_score = 1.0 - bbox.x0 / page.width;
    let y_score = 1.0 - bbox.y0 / page.height;
    Ok(((x_score + y_score) / 2.0).clamp(0.0, 1.0))
}

/// Standalone 6-8 digit runs in `text`, in order of appearance
pub fn find_id_patterns(text: &str) -> impl Iterator<Item = &str> {
    ID_PATTERN_RE.find_iter(text).map(|m| m.as_str())
}

/// Collect validated candidates from header blocks, in block order
pub fn harvest_candidates(
    blocks: &[TextBlock],
    page: PageSize,
    max_context_chars: usize,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for span in blocks.iter().flat_map(|b| b.spans()) {
        let text = span.text.trim();

        for digits in find_id_patterns(text) {
            if let Err(reason) = validate_candidate(digits, text, max_context_chars) {
                log::debug!("rejected {:?} in {:?}: {:?}", digits, text, reason);
                continue;
            }

            let position_score = position_score(&span.bbox, page).unwrap_or_else(|e| {
                log::debug!("position score for {:?} defaulted: {}", digits, e);
                NEUTRAL_POSITION_SCORE
            });

            candidates.push(Candidate {
                digits: digits.to_string(),
                context: text.to_string(),
                bbox: span.bbox,
                position_score,
            });
        }
    }

    candidates
}

/// Bonus for the digit count; shorter IDs are more common
pub fn length_bonus(digits: &str) -> f32 {
    match digits.len() {
        6 => 0.3,
        7 => 0.2,
        8 => 0.1,
        _ => 0.0,
    }
}

/// Bonus for terse surrounding text
pub fn context_bonus(context: &str) -> f32 {
    match context.trim().chars().count() {
        0..=20 => 0.3,
        21..=30 => 0.2,
        _ => 0.1,
    }
}

/// Weighted score of a candidate
pub fn candidate_score(candidate: &Candidate) -> f32 {
    candidate.position_score * POSITION_WEIGHT
        + length_bonus(&candidate.digits)
        + context_bonus(&candidate.context)
}

/// Pick the most plausible candidate
///
/// A lone candidate is returned without scoring. Otherwise the highest
/// [`candidate_score`] wins, with ties going to the earliest harvested.
pub fn select_best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    match candidates {
        [] => None,
        [only] => Some(only),
        _ => {
            let mut scored: Vec<(&Candidate, f32)> =
                candidates.iter().map(|c| (c, candidate_score(c))).collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let (best, score) = scored[0];
            log::info!("Selected TSP ID '{}' with score {:.3}", best.digits, score);
            Some(best)
        }
    }
}

/// First valid ID pattern anywhere in `text`, ignoring layout
///
/// Context is treated as empty, so the surrounding-text rule never applies.
pub fn fallback_candidate(text: &str) -> Option<&str> {
    find_id_patterns(text).find(|digits| is_valid_candidate(digits, "", usize::MAX))
}
