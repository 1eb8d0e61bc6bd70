use serde::Serialize;

use crate::db::models::{DocumentRef, SessionId, SessionStats, TopicId};

/// Live view of the open session, recomputed on every request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub session_id: SessionId,
    pub document: DocumentRef,
    pub topic_id: Option<TopicId>,
    pub elapsed_secs: u64,
    pub active_secs: u64,
    pub idle_secs: u64,
    pub pages_visited: u32,
    pub current_page: u32,
    /// Paused by the idle detector.
    pub is_idle: bool,
    /// Paused for any reason, manual or automatic.
    pub is_paused: bool,
    pub pages_per_minute: f64,
}

/// Notifications published by the session timer to its subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        session_id: SessionId,
        stats: SessionStats,
    },
    #[serde(rename_all = "camelCase")]
    SessionPaused { session_id: SessionId, is_manual: bool },
    #[serde(rename_all = "camelCase")]
    SessionResumed { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    PageChanged {
        session_id: SessionId,
        old_page: u32,
        new_page: u32,
    },
    #[serde(rename_all = "camelCase")]
    IdleDetected { is_idle: bool },
    StatsUpdated(LiveStats),
}

impl SessionEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session-started",
            SessionEvent::SessionEnded { .. } => "session-ended",
            SessionEvent::SessionPaused { .. } => "session-paused",
            SessionEvent::SessionResumed { .. } => "session-resumed",
            SessionEvent::PageChanged { .. } => "page-changed",
            SessionEvent::IdleDetected { .. } => "idle-detected",
            SessionEvent::StatsUpdated(_) => "stats-updated",
        }
    }
}
