//! Document and topic references.
//!
//! A session, page-time record or reading metric belongs to exactly one main
//! document or exactly one exercise document; `DocumentRef` makes that
//! exclusivity part of the type instead of two nullable columns.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type TopicId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum DocumentRef {
    Main(i64),
    Exercise(i64),
}

impl DocumentRef {
    pub fn id(&self) -> i64 {
        match self {
            DocumentRef::Main(id) | DocumentRef::Exercise(id) => *id,
        }
    }

    pub fn is_exercise(&self) -> bool {
        matches!(self, DocumentRef::Exercise(_))
    }

    /// Value stored in the `document_kind` columns.
    pub fn kind_str(&self) -> &'static str {
        match self {
            DocumentRef::Main(_) => "pdf",
            DocumentRef::Exercise(_) => "exercise",
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRef::Main(id) => write!(f, "main PDF {id}"),
            DocumentRef::Exercise(id) => write!(f, "exercise PDF {id}"),
        }
    }
}

/// Aggregate page progress across the main documents of a topic.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProgress {
    pub total_pages: u64,
    pub pages_read: u64,
}

impl DocumentProgress {
    /// Percentage read, clamped to [0, 100]. `None` when the topic has no pages.
    pub fn percent(&self) -> Option<f64> {
        if self.total_pages == 0 {
            return None;
        }
        Some((self.pages_read as f64 / self.total_pages as f64 * 100.0).min(100.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
}

/// A main document or an exercise document attached to a parent document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
    pub title: String,
    pub total_pages: u32,
    pub current_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_is_clamped() {
        let progress = DocumentProgress {
            total_pages: 10,
            pages_read: 12,
        };
        assert_eq!(progress.percent(), Some(100.0));
        assert_eq!(DocumentProgress::default().percent(), None);
    }

    #[test]
    fn document_ref_kind() {
        assert_eq!(DocumentRef::Main(3).kind_str(), "pdf");
        assert!(DocumentRef::Exercise(3).is_exercise());
        assert_eq!(DocumentRef::Exercise(7).id(), 7);
    }
}
