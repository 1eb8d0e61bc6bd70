use serde::{Deserialize, Serialize};

use crate::db::models::DocumentRef;

/// Seconds per page assumed when no reading history exists at all.
pub const DEFAULT_SECONDS_PER_PAGE: f64 = 90.0;
pub const DEFAULT_EXERCISE_SECONDS_PER_PAGE: f64 = 120.0;
/// Nominal length of one study session.
pub const SESSION_MINUTES: f64 = 25.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_history(pages_read: u64) -> Self {
        if pages_read >= 20 {
            Confidence::High
        } else if pages_read >= 5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadingPace {
    Fast,
    Moderate,
    Careful,
    Thorough,
}

impl ReadingPace {
    pub fn from_seconds_per_page(seconds: f64) -> Self {
        if seconds < 60.0 {
            ReadingPace::Fast
        } else if seconds < 90.0 {
            ReadingPace::Moderate
        } else if seconds < 150.0 {
            ReadingPace::Careful
        } else {
            ReadingPace::Thorough
        }
    }
}

/// Where the seconds-per-page figure of an estimate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Document,
    Topic,
    UserWide,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishEstimate {
    pub pages_remaining: u32,
    pub avg_seconds_per_page: f64,
    pub estimated_seconds: f64,
    pub estimated_minutes: f64,
    pub estimated_hours: f64,
    pub sessions_needed: u32,
    pub confidence: Confidence,
    pub pace: ReadingPace,
    pub source: EstimateSource,
}

pub fn default_seconds_per_page(document: DocumentRef) -> f64 {
    if document.is_exercise() {
        DEFAULT_EXERCISE_SECONDS_PER_PAGE
    } else {
        DEFAULT_SECONDS_PER_PAGE
    }
}

/// Pages left when the reader is on `current_page`. Being on the last page
/// counts as finished.
pub fn pages_remaining(current_page: u32, total_pages: u32) -> u32 {
    if current_page >= total_pages {
        return 0;
    }
    total_pages - current_page.max(1) + 1
}

pub fn sessions_needed(estimated_minutes: f64) -> u32 {
    ((estimated_minutes / SESSION_MINUTES).ceil() as u32).max(1)
}

/// Build an estimate from a seconds-per-page figure and the history behind it.
/// `history_pages` is `None` for the fixed default.
pub fn build_estimate(
    current_page: u32,
    total_pages: u32,
    avg_seconds_per_page: f64,
    history_pages: Option<u64>,
    source: EstimateSource,
) -> FinishEstimate {
    let remaining = pages_remaining(current_page, total_pages);
    let estimated_seconds = remaining as f64 * avg_seconds_per_page;
    let estimated_minutes = estimated_seconds / 60.0;

    FinishEstimate {
        pages_remaining: remaining,
        avg_seconds_per_page,
        estimated_seconds,
        estimated_minutes,
        estimated_hours: estimated_seconds / 3600.0,
        sessions_needed: sessions_needed(estimated_minutes),
        confidence: history_pages
            .map(Confidence::from_history)
            .unwrap_or(Confidence::Low),
        pace: ReadingPace::from_seconds_per_page(avg_seconds_per_page),
        source,
    }
}
