use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    db::{
        connection::Database,
        models::{
            DailyReadingStats, DocumentProgress, DocumentRef, Goal, GoalAdjustment, GoalId,
            GoalProgress, MetricSubject, NewGoal, PageTimeRecord, ProgressDelta, ReadingMetric,
            ScheduleGap, Session, SessionClose, SessionId, SessionRefs, TopicId,
        },
    },
    store::StudyStore,
};

#[async_trait]
impl StudyStore for Database {
    async fn create_session(
        &self,
        document: DocumentRef,
        topic_id: Option<TopicId>,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        let session_id = Uuid::new_v4().to_string();
        self.insert_session(session_id.clone(), document, topic_id, started_at)
            .await?;
        Ok(session_id)
    }

    async fn end_session(&self, close: SessionClose) -> Result<SessionRefs> {
        self.close_session(close).await
    }

    async fn save_page_time(&self, record: PageTimeRecord) -> Result<()> {
        self.insert_page_time(&record).await
    }

    async fn get_session_history(
        &self,
        days: u32,
        document: Option<DocumentRef>,
    ) -> Result<Vec<Session>> {
        self.list_session_history(days, document).await
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyReadingStats>> {
        self.get_daily_reading_stats(date).await
    }

    async fn get_reading_metric(&self, subject: MetricSubject) -> Result<Option<ReadingMetric>> {
        Database::get_reading_metric(self, subject).await
    }

    async fn get_document_topic(&self, document: DocumentRef) -> Result<Option<TopicId>> {
        Database::get_document_topic(self, document).await
    }

    async fn get_document_progress(&self, topic_id: TopicId) -> Result<DocumentProgress> {
        self.get_topic_progress(topic_id).await
    }

    async fn create_goal(&self, goal: NewGoal) -> Result<Goal> {
        self.insert_goal(goal).await
    }

    async fn get_goal(&self, goal_id: GoalId) -> Result<Option<Goal>> {
        Database::get_goal(self, goal_id).await
    }

    async fn get_active_goals(&self, topic_id: Option<TopicId>) -> Result<Vec<Goal>> {
        Database::get_active_goals(self, topic_id).await
    }

    async fn record_topic_progress(
        &self,
        topic_id: TopicId,
        delta: ProgressDelta,
    ) -> Result<Vec<GoalProgress>> {
        Database::record_topic_progress(self, topic_id, delta).await
    }

    async fn get_goal_progress(&self, goal_id: GoalId, date: NaiveDate) -> Result<Option<GoalProgress>> {
        Database::get_goal_progress(self, goal_id, date).await
    }

    async fn get_goal_progress_history(
        &self,
        goal_id: GoalId,
        since: NaiveDate,
    ) -> Result<Vec<GoalProgress>> {
        Database::get_goal_progress_history(self, goal_id, since).await
    }

    async fn complete_goal(&self, goal_id: GoalId) -> Result<()> {
        self.mark_goal_completed(goal_id).await
    }

    async fn deactivate_goal(&self, goal_id: GoalId) -> Result<()> {
        Database::deactivate_goal(self, goal_id).await
    }

    async fn adjust_goal(
        &self,
        goal_id: GoalId,
        new_target: u32,
        reason: String,
        adjusted_on: NaiveDate,
        schedule: Option<ScheduleGap>,
    ) -> Result<GoalAdjustment> {
        self.adjust_goal_target(goal_id, new_target, reason, adjusted_on, schedule)
            .await
    }

    async fn get_goal_adjustments(&self, goal_id: GoalId) -> Result<Vec<GoalAdjustment>> {
        Database::get_goal_adjustments(self, goal_id).await
    }
}
