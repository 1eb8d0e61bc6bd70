use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DocumentRef, TopicId};

/// Key of a reading metric: one document, one topic, or everything the user read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum MetricSubject {
    Document(DocumentRef),
    Topic(TopicId),
    UserWide,
}

impl MetricSubject {
    /// `(subject_kind, subject_id)` columns; `None` for the pooled user-wide view.
    pub fn columns(&self) -> Option<(&'static str, i64)> {
        match self {
            MetricSubject::Document(document) => Some((document.kind_str(), document.id())),
            MetricSubject::Topic(topic_id) => Some(("topic", *topic_id)),
            MetricSubject::UserWide => None,
        }
    }
}

/// Rolling reading speed, recomputed as a pooled mean of cumulative pages and time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMetric {
    pub subject: MetricSubject,
    pub pages_per_minute: f64,
    pub avg_seconds_per_page: f64,
    pub total_pages_read: u64,
    pub total_time_ms: u64,
    pub last_calculated: DateTime<Utc>,
}

impl ReadingMetric {
    /// Pooled averages for the given cumulative totals.
    pub fn pooled(total_pages_read: u64, total_time_ms: u64) -> (f64, f64) {
        let secs = total_time_ms as f64 / 1000.0;
        let ppm = if secs > 0.0 {
            total_pages_read as f64 / (secs / 60.0)
        } else {
            0.0
        };
        let avg = if total_pages_read > 0 {
            secs / total_pages_read as f64
        } else {
            0.0
        };
        (ppm, avg)
    }
}
