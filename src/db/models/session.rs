//! Session-related data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DocumentRef, TopicId};

pub type SessionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "Running",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
        }
    }
}

/// A persisted reading session. `ended_at` stays `None` while the session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_ms: u64,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub pages_visited: u32,
    pub reading_speed_ppm: f64,
    pub efficiency_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Time spent on a single visit to a page. A page visited twice yields two records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageTimeRecord {
    pub session_id: SessionId,
    pub document: DocumentRef,
    pub page_number: u32,
    pub duration_ms: u64,
}

/// Final aggregates written when a session is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClose {
    pub session_id: SessionId,
    pub ended_at: DateTime<Utc>,
    pub total_ms: u64,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub pages_visited: u32,
    /// Present when the session produced a usable reading-speed sample.
    pub metric: Option<MetricSample>,
}

/// One session's contribution to the rolling reading metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub pages_per_minute: f64,
    pub avg_seconds_per_page: f64,
    pub pages_read: u64,
    pub time_spent_ms: u64,
}

impl MetricSample {
    /// Derive a sample from a session's active time; `None` without pages or time.
    pub fn from_session(pages: u32, active_ms: u64) -> Option<Self> {
        if pages == 0 || active_ms == 0 {
            return None;
        }
        let active_secs = active_ms as f64 / 1000.0;
        Some(Self {
            pages_per_minute: pages as f64 / (active_secs / 60.0),
            avg_seconds_per_page: active_secs / pages as f64,
            pages_read: pages as u64,
            time_spent_ms: active_ms,
        })
    }
}

/// What the store reports back when a session is closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRefs {
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
}

/// Final statistics of an ended session, as reported to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: SessionId,
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_ms: u64,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub pages_visited: u32,
    pub pages_per_minute: f64,
    pub avg_seconds_per_page: Option<f64>,
    pub efficiency_percent: f64,
    /// False when the store rejected the final write.
    pub saved: bool,
}

impl SessionStats {
    pub fn total_secs(&self) -> u64 {
        self.total_ms / 1000
    }

    pub fn active_secs(&self) -> u64 {
        self.active_ms / 1000
    }

    pub fn idle_secs(&self) -> u64 {
        self.idle_ms / 1000
    }
}

/// Reading totals for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyReadingStats {
    pub date: NaiveDate,
    pub sessions_count: u32,
    pub total_ms: u64,
    pub active_ms: u64,
    pub pages_read: u64,
    pub avg_reading_speed_ppm: f64,
}

/// Efficiency of a session: share of wall-clock time that was active.
pub fn efficiency_percent(total_ms: u64, active_ms: u64) -> f64 {
    if total_ms == 0 {
        return 0.0;
    }
    (active_ms as f64 / total_ms as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_sample_requires_pages_and_time() {
        assert!(MetricSample::from_session(0, 60_000).is_none());
        assert!(MetricSample::from_session(3, 0).is_none());

        let sample = MetricSample::from_session(4, 120_000).unwrap();
        assert!((sample.pages_per_minute - 2.0).abs() < 1e-9);
        assert!((sample.avg_seconds_per_page - 30.0).abs() < 1e-9);
        assert_eq!(sample.pages_read, 4);
        assert_eq!(sample.time_spent_ms, 120_000);
    }

    #[test]
    fn efficiency_handles_empty_sessions() {
        assert_eq!(efficiency_percent(0, 0), 0.0);
        assert_eq!(efficiency_percent(200, 150), 75.0);
    }
}
