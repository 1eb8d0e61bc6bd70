//! The persistence boundary of the core.
//!
//! The session timer, the reading-intelligence facade and the goals manager only
//! talk to storage through [`StudyStore`]. `Database` is the SQLite
//! implementation; tests substitute their own.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::models::{
    DailyReadingStats, DocumentProgress, DocumentRef, Goal, GoalAdjustment, GoalId, GoalProgress,
    MetricSubject, NewGoal, PageTimeRecord, ProgressDelta, ReadingMetric, ScheduleGap, Session,
    SessionClose, SessionId, SessionRefs, TopicId,
};

#[async_trait]
pub trait StudyStore: Send + Sync {
    // --- Sessions ---
    async fn create_session(
        &self,
        document: DocumentRef,
        topic_id: Option<TopicId>,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId>;

    /// Close the session with its final aggregates. When `close.metric` is set the
    /// reading metrics are updated in the same transaction.
    async fn end_session(&self, close: SessionClose) -> Result<SessionRefs>;

    async fn save_page_time(&self, record: PageTimeRecord) -> Result<()>;

    async fn get_session_history(
        &self,
        days: u32,
        document: Option<DocumentRef>,
    ) -> Result<Vec<Session>>;

    async fn get_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyReadingStats>>;

    // --- Reading metrics ---
    async fn get_reading_metric(&self, subject: MetricSubject) -> Result<Option<ReadingMetric>>;

    // --- Documents ---
    async fn get_document_topic(&self, document: DocumentRef) -> Result<Option<TopicId>>;

    async fn get_document_progress(&self, topic_id: TopicId) -> Result<DocumentProgress>;

    // --- Goals ---
    async fn create_goal(&self, goal: NewGoal) -> Result<Goal>;

    async fn get_goal(&self, goal_id: GoalId) -> Result<Option<Goal>>;

    async fn get_active_goals(&self, topic_id: Option<TopicId>) -> Result<Vec<Goal>>;

    /// Apply `delta` to every active goal of the topic in one transaction.
    async fn record_topic_progress(
        &self,
        topic_id: TopicId,
        delta: ProgressDelta,
    ) -> Result<Vec<GoalProgress>>;

    async fn get_goal_progress(&self, goal_id: GoalId, date: NaiveDate) -> Result<Option<GoalProgress>>;

    /// Rows dated on or after `since`, newest first.
    async fn get_goal_progress_history(
        &self,
        goal_id: GoalId,
        since: NaiveDate,
    ) -> Result<Vec<GoalProgress>>;

    async fn complete_goal(&self, goal_id: GoalId) -> Result<()>;

    async fn deactivate_goal(&self, goal_id: GoalId) -> Result<()>;

    /// Set a new target and record the change. `schedule` is only given for
    /// automatic adjustments of deadline goals.
    async fn adjust_goal(
        &self,
        goal_id: GoalId,
        new_target: u32,
        reason: String,
        adjusted_on: NaiveDate,
        schedule: Option<ScheduleGap>,
    ) -> Result<GoalAdjustment>;

    async fn get_goal_adjustments(&self, goal_id: GoalId) -> Result<Vec<GoalAdjustment>>;
}
