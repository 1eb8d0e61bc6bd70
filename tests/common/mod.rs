#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;
use tokio::sync::broadcast;

use studytrack::{
    db::models::{
        DailyReadingStats, DocumentProgress, DocumentRef, Goal, GoalAdjustment, GoalId,
        GoalProgress, MetricSubject, NewGoal, PageTimeRecord, ProgressDelta, ReadingMetric,
        ScheduleGap, Session, SessionClose, SessionId, SessionRefs, TopicId,
    },
    timer::TimerConfig,
    Database, SessionEvent, StudyStore,
};

/// A database in a fresh temporary directory. Keep the `TempDir` alive for
/// the duration of the test.
pub fn temp_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::new(dir.path().join("test.sqlite3")).expect("open database");
    (dir, db)
}

/// A new topic holding one main document of `total_pages` pages.
pub async fn seed_document(db: &Database, total_pages: u32) -> (TopicId, DocumentRef) {
    static TOPICS: AtomicUsize = AtomicUsize::new(0);
    let n = TOPICS.fetch_add(1, Ordering::SeqCst);
    let topic = db
        .create_topic(format!("Linear algebra {n}"))
        .await
        .expect("create topic");
    let document = db
        .add_pdf(topic.id, "Lecture notes".into(), total_pages)
        .await
        .expect("add pdf");
    (topic.id, document)
}

/// Timer settings that never fire the periodic stats broadcast and check for
/// idleness often, so tests only depend on the manual clock.
pub fn quiet_config() -> TimerConfig {
    TimerConfig {
        idle_threshold: Duration::from_secs(120),
        idle_check_interval: Duration::from_millis(20),
        stats_interval: Duration::from_secs(3600),
    }
}

/// Next event other than the periodic stats broadcast.
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event channel closed");
        if !matches!(event, SessionEvent::StatsUpdated(_)) {
            return event;
        }
    }
}

/// Drain everything already queued on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if !matches!(event, SessionEvent::StatsUpdated(_)) {
            events.push(event);
        }
    }
    events
}

/// Delegates to a real database, failing session writes on demand.
pub struct FlakyStore {
    pub inner: Database,
    pub fail_create: AtomicBool,
    pub fail_end: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Database) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
        })
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_end(&self, fail: bool) {
        self.fail_end.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StudyStore for FlakyStore {
    async fn create_session(
        &self,
        document: DocumentRef,
        topic_id: Option<TopicId>,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        StudyStore::create_session(&self.inner, document, topic_id, started_at).await
    }

    async fn end_session(&self, close: SessionClose) -> Result<SessionRefs> {
        if self.fail_end.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        StudyStore::end_session(&self.inner, close).await
    }

    async fn save_page_time(&self, record: PageTimeRecord) -> Result<()> {
        StudyStore::save_page_time(&self.inner, record).await
    }

    async fn get_session_history(&self, days: u32, document: Option<DocumentRef>) -> Result<Vec<Session>> {
        StudyStore::get_session_history(&self.inner, days, document).await
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> Result<Option<DailyReadingStats>> {
        StudyStore::get_daily_stats(&self.inner, date).await
    }

    async fn get_reading_metric(&self, subject: MetricSubject) -> Result<Option<ReadingMetric>> {
        StudyStore::get_reading_metric(&self.inner, subject).await
    }

    async fn get_document_topic(&self, document: DocumentRef) -> Result<Option<TopicId>> {
        StudyStore::get_document_topic(&self.inner, document).await
    }

    async fn get_document_progress(&self, topic_id: TopicId) -> Result<DocumentProgress> {
        StudyStore::get_document_progress(&self.inner, topic_id).await
    }

    async fn create_goal(&self, goal: NewGoal) -> Result<Goal> {
        StudyStore::create_goal(&self.inner, goal).await
    }

    async fn get_goal(&self, goal_id: GoalId) -> Result<Option<Goal>> {
        StudyStore::get_goal(&self.inner, goal_id).await
    }

    async fn get_active_goals(&self, topic_id: Option<TopicId>) -> Result<Vec<Goal>> {
        StudyStore::get_active_goals(&self.inner, topic_id).await
    }

    async fn record_topic_progress(&self, topic_id: TopicId, delta: ProgressDelta) -> Result<Vec<GoalProgress>> {
        StudyStore::record_topic_progress(&self.inner, topic_id, delta).await
    }

    async fn get_goal_progress(&self, goal_id: GoalId, date: NaiveDate) -> Result<Option<GoalProgress>> {
        StudyStore::get_goal_progress(&self.inner, goal_id, date).await
    }

    async fn get_goal_progress_history(&self, goal_id: GoalId, since: NaiveDate) -> Result<Vec<GoalProgress>> {
        StudyStore::get_goal_progress_history(&self.inner, goal_id, since).await
    }

    async fn complete_goal(&self, goal_id: GoalId) -> Result<()> {
        StudyStore::complete_goal(&self.inner, goal_id).await
    }

    async fn deactivate_goal(&self, goal_id: GoalId) -> Result<()> {
        StudyStore::deactivate_goal(&self.inner, goal_id).await
    }

    async fn adjust_goal(
        &self,
        goal_id: GoalId,
        new_target: u32,
        reason: String,
        adjusted_on: NaiveDate,
        schedule: Option<ScheduleGap>,
    ) -> Result<GoalAdjustment> {
        StudyStore::adjust_goal(&self.inner, goal_id, new_target, reason, adjusted_on, schedule).await
    }

    async fn get_goal_adjustments(&self, goal_id: GoalId) -> Result<Vec<GoalAdjustment>> {
        StudyStore::get_goal_adjustments(&self.inner, goal_id).await
    }
}
